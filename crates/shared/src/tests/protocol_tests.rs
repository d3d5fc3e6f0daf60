use super::*;
use serde_json::json;

#[test]
fn reads_classification_and_interval_from_meta() {
    let snapshot = TelemetrySnapshot::from_json_value(json!({
        "type": "meta",
        "id": "session_12_2020-01-11",
        "attributes": {
            "interval": 2.0,
            "temperature": "98.5",
            "classification_data": {
                "water": {
                    "boiling": { "boolean": true, "confidence": 0.93 },
                    "not_boiling": { "boolean": false }
                }
            }
        }
    }))
    .expect("snapshot");

    assert_eq!(snapshot.interval(), Some(2.0));
    assert_eq!(snapshot.classification("water", "boiling"), Some(true));
    assert_eq!(snapshot.classification("water", "not_boiling"), Some(false));
    assert_eq!(snapshot.classification("water", "simmering"), None);
    assert_eq!(snapshot.classification("onion", "boiling"), None);
    assert_eq!(snapshot.attributes.other["temperature"], "98.5");
}

#[test]
fn accepts_double_encoded_meta_and_string_interval() {
    let inner = json!({
        "type": "meta",
        "attributes": { "interval": "0.5", "classification_data": {} }
    });
    let snapshot =
        TelemetrySnapshot::from_json_value(Value::String(inner.to_string())).expect("snapshot");

    assert_eq!(snapshot.interval(), Some(0.5));
}

#[test]
fn missing_attributes_default_to_empty() {
    let snapshot = TelemetrySnapshot::from_json_value(json!({ "type": "meta" })).expect("snapshot");

    assert_eq!(snapshot.interval(), None);
    assert!(snapshot.attributes.classification_data.is_empty());
    assert_eq!(TelemetrySnapshot::default().classification("water", "boiling"), None);
}

#[test]
fn unparseable_interval_is_treated_as_absent() {
    let snapshot = TelemetrySnapshot::from_json_value(json!({
        "attributes": { "interval": "Initialising..." }
    }))
    .expect("snapshot");

    assert_eq!(snapshot.interval(), None);
}

#[test]
fn control_requests_serialize_flat_with_action_tag() {
    assert_eq!(
        serde_json::to_value(ControlRequest::SetClassifiers {
            value: "water".into()
        })
        .expect("json"),
        json!({ "action": "set_classifiers", "value": "water" })
    );
    assert_eq!(
        serde_json::to_value(ControlRequest::SetHobOff).expect("json"),
        json!({ "action": "set_hob_off" })
    );
    assert_eq!(
        serde_json::to_value(ControlRequest::GetLatestMeta).expect("json"),
        json!({ "action": "get_latest_meta" })
    );
}

#[test]
fn builds_commands_by_wire_name() {
    assert_eq!(
        ControlRequest::command("set_temperature_target", Some("80".into())),
        Some(ControlRequest::SetTemperatureTarget { value: "80".into() })
    );
    assert_eq!(
        ControlRequest::command("quit", None),
        Some(ControlRequest::Quit)
    );
    assert_eq!(ControlRequest::command("set_hob_off", Some("1".into())), None);
    assert_eq!(ControlRequest::command("set_classifiers", None), None);
    assert_eq!(ControlRequest::command("get_latest_meta", None), None);
    assert_eq!(ControlRequest::SetHobOff.name(), "set_hob_off");
}
