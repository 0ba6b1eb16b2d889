//! Parsing wide individuals records into [`Individual`]s

use super::{duration_column, flows_column, venues_column, ID_COLUMN};
use crate::error::SnapshotError;
use crate::types::{ActivityVisits, Individual};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A single row of the individuals table
pub type Record = Map<String, Value>;

/// Reader for the wide individuals table
pub struct IndividualsTable;

impl IndividualsTable {
    /// Parse a JSON array of records
    pub fn parse_array<S: AsRef<str>>(
        json: &str,
        categories: &[S],
    ) -> Result<Vec<Individual>, SnapshotError> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Self::from_records(&records, categories)
    }

    /// Parse NDJSON (one record per line, blank lines skipped)
    pub fn parse_ndjson<S: AsRef<str>>(
        ndjson: &str,
        categories: &[S],
    ) -> Result<Vec<Individual>, SnapshotError> {
        let mut individuals = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(trimmed).map_err(|e| {
                SnapshotError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            individuals.push(Self::from_record(&record, categories)?);
        }
        Ok(individuals)
    }

    /// Convert already-decoded records, keeping their order
    pub fn from_records<S: AsRef<str>>(
        records: &[Record],
        categories: &[S],
    ) -> Result<Vec<Individual>, SnapshotError> {
        records
            .iter()
            .map(|record| Self::from_record(record, categories))
            .collect()
    }

    /// Convert one record.
    ///
    /// A category whose three columns are all absent is one the person does not
    /// take part in; a partial set of columns is an error.
    pub fn from_record<S: AsRef<str>>(
        record: &Record,
        categories: &[S],
    ) -> Result<Individual, SnapshotError> {
        let id_value = record
            .get(ID_COLUMN)
            .ok_or_else(|| SnapshotError::MissingColumn(ID_COLUMN.to_string()))?;
        let id: u64 = column_value(id_value, ID_COLUMN)?;

        let mut individual = Individual::new(id);
        for category in categories {
            let category = category.as_ref();
            if let Some(visits) = read_visits(record, category, id)? {
                individual.activities.insert(category.to_string(), visits);
            }
        }
        Ok(individual)
    }

    /// Render individuals back into wide records for the given categories
    pub fn to_records<S: AsRef<str>>(individuals: &[Individual], categories: &[S]) -> Vec<Record> {
        individuals
            .iter()
            .map(|person| {
                let mut record = Record::new();
                record.insert(ID_COLUMN.to_string(), Value::from(person.id));
                for category in categories {
                    let category = category.as_ref();
                    if let Some(visits) = person.visits(category) {
                        record.insert(venues_column(category), Value::from(visits.venues.clone()));
                        record.insert(flows_column(category), Value::from(visits.flows.clone()));
                        record.insert(duration_column(category), Value::from(visits.duration));
                    }
                }
                record
            })
            .collect()
    }
}

fn read_visits(
    record: &Record,
    category: &str,
    person_id: u64,
) -> Result<Option<ActivityVisits>, SnapshotError> {
    let venues_key = venues_column(category);
    let flows_key = flows_column(category);
    let duration_key = duration_column(category);

    let columns = (
        record.get(&venues_key),
        record.get(&flows_key),
        record.get(&duration_key),
    );

    match columns {
        (None, None, None) => Ok(None),
        (Some(venues), Some(flows), Some(duration)) => {
            let venues: Vec<i64> = column_value(venues, &venues_key)?;
            let flows: Vec<f64> = column_value(flows, &flows_key)?;
            let duration: f64 = column_value(duration, &duration_key)?;
            Ok(Some(ActivityVisits::new(venues, flows, duration)))
        }
        (venues, flows, _) => {
            let missing = if venues.is_none() {
                venues_key
            } else if flows.is_none() {
                flows_key
            } else {
                duration_key
            };
            Err(SnapshotError::MissingColumn(format!(
                "{missing} (person {person_id})"
            )))
        }
    }
}

fn column_value<'de, T: Deserialize<'de>>(
    value: &'de Value,
    column: &str,
) -> Result<T, SnapshotError> {
    T::deserialize(value)
        .map_err(|e| SnapshotError::ParseError(format!("column {column}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATEGORIES: [&str; 2] = ["Home", "Retail"];

    fn sample_json() -> &'static str {
        r#"[
            {"ID": 0, "age": 43,
             "Home_Venues": [0], "Home_Flows": [1.0], "Home_Duration": 0.8,
             "Retail_Venues": [0, 2, 4], "Retail_Flows": [0.2, 0.5, 0.3], "Retail_Duration": 0.2},
            {"ID": 1, "age": 22,
             "Home_Venues": [1], "Home_Flows": [1.0], "Home_Duration": 0.7,
             "Retail_Venues": [1, 2, 3], "Retail_Flows": [0.1, 0.6, 0.3], "Retail_Duration": 0.3},
            {"ID": 3, "age": 33,
             "Home_Venues": [2], "Home_Flows": [1.0], "Home_Duration": 0.6}
        ]"#
    }

    #[test]
    fn test_parse_array() {
        let people = IndividualsTable::parse_array(sample_json(), &CATEGORIES).unwrap();

        assert_eq!(people.len(), 3);
        assert_eq!(people[0].id, 0);
        assert_eq!(
            people[0].visits("Retail"),
            Some(&ActivityVisits::new(vec![0, 2, 4], vec![0.2, 0.5, 0.3], 0.2))
        );
        assert_eq!(people[2].id, 3);
        assert!(people[2].visits("Retail").is_none());
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let ndjson = concat!(
            r#"{"ID": 5, "Home_Venues": [1], "Home_Flows": [1.0], "Home_Duration": 1.0}"#,
            "\n\n",
            r#"{"ID": 6, "Home_Venues": [2], "Home_Flows": [1.0], "Home_Duration": 1.0}"#,
            "\n"
        );
        let people = IndividualsTable::parse_ndjson(ndjson, &CATEGORIES).unwrap();
        let ids: Vec<u64> = people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn test_ndjson_reports_line() {
        let ndjson = "{\"ID\": 1}\nnot json\n";
        let err = IndividualsTable::parse_ndjson(ndjson, &CATEGORIES).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_missing_id_column() {
        let err = IndividualsTable::parse_array(r#"[{"age": 4}]"#, &CATEGORIES).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingColumn(ref c) if c == "ID"));
    }

    #[test]
    fn test_partial_category_columns() {
        let json = r#"[{"ID": 2, "Retail_Venues": [1], "Retail_Duration": 0.5}]"#;
        let err = IndividualsTable::parse_array(json, &CATEGORIES).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingColumn(ref c) if c.starts_with("Retail_Flows")));
    }

    #[test]
    fn test_wrong_column_type() {
        let json = r#"[{"ID": 2, "Home_Venues": ["a"], "Home_Flows": [1.0], "Home_Duration": 1.0}]"#;
        let err = IndividualsTable::parse_array(json, &CATEGORIES).unwrap_err();
        assert!(matches!(err, SnapshotError::ParseError(ref m) if m.contains("Home_Venues")));
    }

    #[test]
    fn test_records_round_trip() {
        let people = IndividualsTable::parse_array(sample_json(), &CATEGORIES).unwrap();
        let records = IndividualsTable::to_records(&people, &CATEGORIES);
        let reparsed = IndividualsTable::from_records(&records, &CATEGORIES).unwrap();
        assert_eq!(reparsed, people);
    }
}
