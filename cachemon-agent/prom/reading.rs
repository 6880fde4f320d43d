use std::path::Path;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::counters::engine::CounterReading;
use crate::counters::events;
use crate::error::Result;

/// Renders counter readings in the Prometheus text format
///
/// Meant for node_exporter's textfile collector: one run writes one file,
/// the collector picks it up on its next scrape.
pub struct ReadingExporter {
    registry: Registry,
    counts: GaugeVec,
}

impl ReadingExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let counts = GaugeVec::new(
            Opts::new(
                "cachemon_counter_value",
                "Events counted by one general-purpose counter over one measurement window",
            ),
            &["cpu", "level", "metric", "slot", "event", "confirmed"],
        )?;
        registry.register(Box::new(counts.clone()))?;

        Ok(Self { registry, counts })
    }

    pub fn record(&self, cpu: u32, reading: &CounterReading) {
        let (event, confirmed) = events::lookup(reading.level(), reading.kind())
            .map(|e| (e.name, e.confirmed))
            .unwrap_or(("unknown", false));

        self.counts
            .with_label_values(&[
                &cpu.to_string(),
                reading.level().name(),
                reading.kind().name(),
                &reading.slot().to_string(),
                event,
                if confirmed { "true" } else { "false" },
            ])
            .set(reading.value() as f64);
    }

    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write to `path` via a temporary sibling and rename, so the collector
    /// never sees a partial file
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let text = self.encode()?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!("Wrote counter reading to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::events::{CacheLevel, MetricKind};
    use cachemon_raw::current_arch::core::CounterSlot;

    fn l3_miss_reading() -> CounterReading {
        CounterReading::new(CacheLevel::L3, MetricKind::AllMisses, CounterSlot::Slot2, 1234, 0)
    }

    #[test]
    fn test_encode_reading() {
        let exporter = ReadingExporter::new().unwrap();
        exporter.record(3, &l3_miss_reading());

        let text = exporter.encode().unwrap();
        assert!(text.contains("# TYPE cachemon_counter_value gauge"));
        assert!(text.contains("cpu=\"3\""));
        assert!(text.contains("level=\"l3\""));
        assert!(text.contains("metric=\"all-misses\""));
        assert!(text.contains("slot=\"2\""));
        assert!(text.contains("event=\"LONGEST_LAT_CACHE.MISS\""));
        assert!(text.contains("} 1234"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = std::env::temp_dir().join(format!("cachemon-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cachemon.prom");

        let exporter = ReadingExporter::new().unwrap();
        exporter.record(0, &l3_miss_reading());
        exporter.write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("cachemon_counter_value"));
        assert!(!path.with_extension("prom.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
