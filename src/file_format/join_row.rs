use serde::{Deserialize, Deserializer, Serialize};

/// One row of the customer/part/revision/trial/run/file left join.  Each row
/// describes (at most) one file along with the full key path of its
/// ancestors.  Everything after `customer_name` can be missing because the
/// join is a chain of `LEFT JOIN`s, so a part revision that has no trials yet
/// shows up as a row whose trial, run, and file columns are all `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRow {
    pub customer_name: String,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub part_revision_name: Option<String>,
    #[serde(default)]
    pub trial_uuid: Option<String>,
    /// Tri-state: `Some(true)` for a passing trial, `Some(false)` for a failed
    /// one, and `None` when the outcome isn't known (yet).  Database drivers
    /// tend to hand back `0`/`1` for boolean columns so we accept those too.
    #[serde(default, deserialize_with = "deserialize_tri_state")]
    pub trial_success: Option<bool>,
    #[serde(default)]
    pub process_run_type: Option<String>,
    #[serde(default)]
    pub file_location: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTrialSuccess {
    Flag(bool),
    Int(i64),
}

fn deserialize_tri_state<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawTrialSuccess>::deserialize(deserializer)? {
        Some(RawTrialSuccess::Flag(flag)) => Some(flag),
        Some(RawTrialSuccess::Int(value)) => Some(value != 0),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_value};

    #[test]
    fn test_trial_success_encodings() {
        let cases = [
            (r#"{"customer_name": "A", "trial_success": true}"#, Some(true)),
            (r#"{"customer_name": "A", "trial_success": false}"#, Some(false)),
            (r#"{"customer_name": "A", "trial_success": 1}"#, Some(true)),
            (r#"{"customer_name": "A", "trial_success": 0}"#, Some(false)),
            (r#"{"customer_name": "A", "trial_success": null}"#, None),
            (r#"{"customer_name": "A"}"#, None),
        ];

        for (input, expected) in cases.iter() {
            let row: JoinRow = from_str(input).unwrap();
            assert_eq!(row.trial_success, *expected, "decoding {}", input);
        }
    }

    #[test]
    fn test_missing_columns_are_gaps() {
        let row: JoinRow = from_str(r#"{"customer_name": "Acme", "part_name": null}"#).unwrap();
        assert_eq!(
            row,
            JoinRow {
                customer_name: "Acme".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_customer_name_is_required() {
        assert!(from_str::<JoinRow>(r#"{"part_name": "P1"}"#).is_err());
    }

    #[test]
    fn test_serializes_with_column_names() {
        let row = JoinRow {
            customer_name: "A".to_string(),
            part_name: Some("P1".to_string()),
            trial_success: Some(false),
            ..Default::default()
        };
        assert_eq!(
            to_value(&row).unwrap(),
            json!({
                "customer_name": "A",
                "part_name": "P1",
                "part_revision_name": null,
                "trial_uuid": null,
                "trial_success": false,
                "process_run_type": null,
                "file_location": null,
                "file_type": null,
            })
        );
    }
}
