//! Property-based tests for sensor coercion, bounds and reconciliation

use std::collections::BTreeMap;

use proptest::prelude::*;
use remotectl_core::command::{CommandOutput, SensorCommand, SensorSlot};
use remotectl_core::sensor::slugify;
use remotectl_core::{DynamicSensor, Sensor, SensorSpec, SensorValue, ValueType};

fn bounded_sensor(min: i64, max: i64) -> Sensor {
    Sensor::new(
        SensorSpec::new("Free Memory", ValueType::Int)
            .with_min(min as f64)
            .with_max(max as f64),
    )
}

fn arb_disks() -> impl Strategy<Value = BTreeMap<String, u32>> {
    prop::collection::btree_map("[a-z][a-z0-9]{0,7}", any::<u32>(), 0..8)
}

fn disk_lines(disks: &BTreeMap<String, u32>) -> Vec<String> {
    disks.iter().map(|(id, free)| format!("{id}|{free}")).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn slugs_are_stable_keys(name in "[A-Za-z0-9 _./:-]{0,30}") {
        let key = slugify(&name);
        prop_assert!(key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!key.starts_with('_') && !key.ends_with('_'));
        prop_assert!(!key.contains("__"));
        prop_assert_eq!(slugify(&key), key);
    }

    #[test]
    fn child_keys_are_unique(mounts in prop::collection::btree_set("/[a-z_/]{0,6}", 1..10)) {
        let disks = DynamicSensor::new(SensorSpec::new("Free Disk Space", ValueType::Int));
        let output: Vec<String> = mounts.iter().map(|m| format!("{m}|1")).collect();
        disks.update(Some(output.as_slice()));

        let keys: std::collections::HashSet<String> =
            disks.children().iter().map(|c| c.key().to_string()).collect();
        prop_assert_eq!(keys.len(), mounts.len());
    }

    #[test]
    fn in_bounds_values_are_kept(value in -1000i64..1000) {
        let sensor = bounded_sensor(-1000, 1000);
        sensor.update(Some(&value.to_string()));
        prop_assert_eq!(sensor.value(), Some(SensorValue::Int(value)));
        prop_assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(value)));
    }

    #[test]
    fn rejected_values_keep_last_known(good in 0i64..=100, bad in 101i64..10_000) {
        let sensor = bounded_sensor(0, 100);
        sensor.update(Some(&good.to_string()));
        sensor.update(Some(&bad.to_string()));
        prop_assert_eq!(sensor.value(), None);
        prop_assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(good)));
    }

    #[test]
    fn children_follow_latest_output(before in arb_disks(), after in arb_disks()) {
        let disks = DynamicSensor::new(SensorSpec::new("Free Disk Space", ValueType::Int));
        disks.update(Some(&disk_lines(&before)));
        disks.update(Some(&disk_lines(&after)));

        let mut ids: Vec<String> = disks
            .children()
            .iter()
            .map(|child| child.id().unwrap_or_default().to_string())
            .collect();
        ids.sort();
        prop_assert_eq!(ids, after.keys().cloned().collect::<Vec<_>>());
        for (id, free) in &after {
            let child = disks.child(id).unwrap();
            prop_assert_eq!(child.value(), Some(SensorValue::Int(i64::from(*free))));
        }
    }

    #[test]
    fn output_lines_map_by_position(values in prop::collection::vec(0i64..1_000_000, 0..4)) {
        let command = SensorCommand::new(
            "cat /proc/counters",
            (0..3)
                .map(|i| SensorSlot::scalar(SensorSpec::new(format!("Counter {i}"), ValueType::Int)))
                .collect(),
        );
        let stdout = values.iter().map(ToString::to_string).collect();
        command.update_sensors(Some(&CommandOutput::new(stdout, Vec::new(), 0)));

        for (index, sensor) in command.scalar_sensors().iter().enumerate() {
            prop_assert_eq!(sensor.value(), values.get(index).map(|v| SensorValue::Int(*v)));
        }
    }
}
