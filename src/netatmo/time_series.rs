use std::collections::{BTreeMap, btree_map};

use indexmap::IndexMap;

use crate::netatmo::MeasurementType;

/// One `(timestamp, value)` pair from a getmeasure response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurePoint {
    pub timestamp: i64,

    /// `None` when the upstream reported `null` for this slot.
    pub value: Option<f64>,
}

/// One value per configured measurement type, in configured order.
pub type Record = IndexMap<MeasurementType, f64>;

/// A device's measurements merged by Unix timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    records: BTreeMap<i64, Record>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one measurement stream into the series.
    ///
    /// A timestamp seen for the first time gets a full record with every type in
    /// `fields` set to 0 before `measurement` is written, so each record carries
    /// the same fields whatever order the streams arrive in.
    pub fn merge<I>(&mut self, measurement: &MeasurementType, points: I, fields: &[MeasurementType])
    where
        I: IntoIterator<Item = MeasurePoint>,
    {
        for point in points {
            let record = self
                .records
                .entry(point.timestamp)
                .or_insert_with(|| fields.iter().map(|f| (f.clone(), 0.0)).collect());

            if let Some(value) = point.value {
                record.insert(measurement.clone(), value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, timestamp: i64) -> Option<&Record> {
        self.records.get(&timestamp)
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.records.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.records.keys().next_back().copied()
    }

    /// Iterates records in ascending timestamp order.
    pub fn iter(&self) -> btree_map::Iter<'_, i64, Record> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = (&'a i64, &'a Record);
    type IntoIter = btree_map::Iter<'a, i64, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> Vec<MeasurementType> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    fn points(pairs: &[(i64, f64)]) -> Vec<MeasurePoint> {
        pairs
            .iter()
            .map(|&(timestamp, value)| MeasurePoint {
                timestamp,
                value: Some(value),
            })
            .collect()
    }

    #[test]
    fn test_merge_backfills_missing_measurements_with_zero() {
        let fields = types(&["temperature", "co2", "humidity"]);
        let mut series = TimeSeries::new();

        series.merge(&fields[0], points(&[(100, 21.5), (200, 22.0)]), &fields);
        series.merge(&fields[1], points(&[(200, 450.0), (300, 460.0)]), &fields);

        assert_eq!(series.len(), 3);
        for (_, record) in &series {
            assert_eq!(record.len(), fields.len());
        }

        let first = series.get(100).unwrap();
        assert_eq!(first[&fields[0]], 21.5);
        assert_eq!(first[&fields[1]], 0.0);
        assert_eq!(first[&fields[2]], 0.0);

        let last = series.get(300).unwrap();
        assert_eq!(last[&fields[0]], 0.0);
        assert_eq!(last[&fields[1]], 460.0);
    }

    #[test]
    fn test_record_fields_follow_configured_order() {
        let fields = types(&["temperature", "co2"]);
        let mut series = TimeSeries::new();

        series.merge(&fields[1], points(&[(100, 450.0)]), &fields);
        series.merge(&fields[0], points(&[(100, 20.0)]), &fields);

        let keys: Vec<&str> = series.get(100).unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["temperature", "co2"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fields = types(&["temperature"]);
        let mut once = TimeSeries::new();
        once.merge(&fields[0], points(&[(100, 20.0), (200, 21.0)]), &fields);

        let mut twice = once.clone();
        twice.merge(&fields[0], points(&[(100, 20.0), (200, 21.0)]), &fields);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_null_value_keeps_default() {
        let fields = types(&["temperature"]);
        let mut series = TimeSeries::new();
        series.merge(
            &fields[0],
            [MeasurePoint {
                timestamp: 100,
                value: None,
            }],
            &fields,
        );

        assert_eq!(series.get(100).unwrap()[&fields[0]], 0.0);
    }

    #[test]
    fn test_first_and_last_timestamp() {
        let fields = types(&["temperature"]);
        let mut series = TimeSeries::new();
        assert_eq!(series.first_timestamp(), None);

        series.merge(&fields[0], points(&[(300, 1.0), (100, 2.0), (200, 3.0)]), &fields);
        assert_eq!(series.first_timestamp(), Some(100));
        assert_eq!(series.last_timestamp(), Some(300));

        let order: Vec<i64> = series.iter().map(|(t, _)| *t).collect();
        assert_eq!(order, [100, 200, 300]);
    }
}
