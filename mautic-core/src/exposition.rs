use std::collections::BTreeMap;

use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::error::{ExporterError, ExporterResult};

/// Content type of [`Snapshot::encode`] output.
pub const TEXT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// The ordered result of one successful collection cycle.
///
/// Families appear in catalog order. A vector family whose query returned no rows is
/// kept with zero samples, so callers can tell "no labels this cycle" apart from "metric
/// missing".
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    families: Vec<MetricFamily>,
}

impl Snapshot {
    pub(crate) fn new(families: Vec<MetricFamily>) -> Self {
        Self { families }
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    /// Total number of samples across all families.
    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.get_metric().len()).sum()
    }

    pub fn family(&self, fq_name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.get_name() == fq_name)
    }

    /// Value of an unlabeled counter or gauge.
    pub fn value(&self, fq_name: &str) -> Option<f64> {
        let family = self.family(fq_name)?;
        let metric = family.get_metric().first()?;
        if !metric.get_label().is_empty() {
            return None;
        }
        match family.get_field_type() {
            MetricType::COUNTER => Some(metric.get_counter().get_value()),
            MetricType::GAUGE => Some(metric.get_gauge().get_value()),
            _ => None,
        }
    }

    /// Label value to sample value for a vector family.
    pub fn labeled(&self, fq_name: &str) -> Option<BTreeMap<String, f64>> {
        let family = self.family(fq_name)?;
        let samples = family
            .get_metric()
            .iter()
            .filter_map(|metric| {
                let label = metric.get_label().first()?;
                Some((label.get_value().to_owned(), metric.get_gauge().get_value()))
            })
            .collect();
        Some(samples)
    }

    /// Serializes the snapshot in the Prometheus text exposition format.
    pub fn encode(&self) -> ExporterResult<String> {
        // The text encoder rejects families without samples.
        let families: Vec<MetricFamily> = self
            .families
            .iter()
            .filter(|f| !f.get_metric().is_empty())
            .cloned()
            .collect();

        let mut buffer = Vec::with_capacity(4096);
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|err| ExporterError::Metric(prometheus::Error::Msg(err.to_string())))
    }
}
