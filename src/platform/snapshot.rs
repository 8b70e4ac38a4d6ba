use crate::core::hardware::{Processor, Registers};
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuidEntry {
    pub leaf: u32,
    pub subleaf: u32,
    #[serde(flatten)]
    pub registers: Registers,
}

/// Saved CPUID results and XCR0, replayable in place of a live processor.
///
/// Pairs that were never captured read as zero, the same as a leaf the
/// hardware does not implement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cpuid: Vec<CpuidEntry>,
    #[serde(default)]
    pub xcr0: u64,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn load(path: &Path) -> Result<Self, ProbeError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProbeError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    fn insert(&mut self, leaf: u32, subleaf: u32, registers: Registers) {
        match self
            .cpuid
            .iter_mut()
            .find(|e| e.leaf == leaf && e.subleaf == subleaf)
        {
            Some(entry) => entry.registers = registers,
            None => self.cpuid.push(CpuidEntry {
                leaf,
                subleaf,
                registers,
            }),
        }
    }
}

impl Processor for Snapshot {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Registers {
        self.cpuid
            .iter()
            .find(|e| e.leaf == leaf && e.subleaf == subleaf)
            .map(|e| e.registers)
            .unwrap_or_default()
    }

    fn xgetbv(&self, xcr: u32) -> u64 {
        if xcr == 0 {
            self.xcr0
        } else {
            0
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn cpuid(mut self, leaf: u32, subleaf: u32, registers: Registers) -> Self {
        self.snapshot.insert(leaf, subleaf, registers);
        self
    }

    pub fn xcr0(mut self, xcr0: u64) -> Self {
        self.snapshot.xcr0 = xcr0;
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// Wraps a processor and logs every query made through it.
pub struct Recorder<P> {
    inner: P,
    cpuid: RefCell<Vec<CpuidEntry>>,
    xgetbv: RefCell<Vec<(u32, u64)>>,
}

impl<P: Processor> Recorder<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cpuid: RefCell::new(Vec::new()),
            xgetbv: RefCell::new(Vec::new()),
        }
    }

    /// (leaf, sub-leaf) of each CPUID issued, in order, repeats included.
    pub fn cpuid_queries(&self) -> Vec<(u32, u32)> {
        self.cpuid
            .borrow()
            .iter()
            .map(|e| (e.leaf, e.subleaf))
            .collect()
    }

    pub fn cpuid_count(&self) -> usize {
        self.cpuid.borrow().len()
    }

    pub fn xgetbv_count(&self) -> usize {
        self.xgetbv.borrow().len()
    }

    /// Everything observed so far, as a replayable snapshot.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for entry in self.cpuid.borrow().iter() {
            snapshot.insert(entry.leaf, entry.subleaf, entry.registers);
        }
        if let Some(&(_, xcr0)) = self.xgetbv.borrow().iter().rev().find(|(xcr, _)| *xcr == 0) {
            snapshot.xcr0 = xcr0;
        }
        snapshot
    }
}

impl<P: Processor> Processor for Recorder<P> {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Registers {
        let registers = self.inner.cpuid(leaf, subleaf);
        self.cpuid.borrow_mut().push(CpuidEntry {
            leaf,
            subleaf,
            registers,
        });
        registers
    }

    fn xgetbv(&self, xcr: u32) -> u64 {
        let value = self.inner.xgetbv(xcr);
        self.xgetbv.borrow_mut().push((xcr, value));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::probe;
    use crate::core::table::FeatureTable;
    use tempfile::NamedTempFile;

    #[test]
    fn test_unknown_leaf_reads_zero() {
        let snapshot = Snapshot::builder()
            .cpuid(7, 0, Registers::new(1, 2, 3, 4))
            .xcr0(0x7)
            .build();
        assert_eq!(snapshot.cpuid(7, 0), Registers::new(1, 2, 3, 4));
        assert_eq!(snapshot.cpuid(7, 1), Registers::default());
        assert_eq!(snapshot.xgetbv(0), 0x7);
        assert_eq!(snapshot.xgetbv(1), 0);
    }

    #[test]
    fn test_builder_overwrites_pair() {
        let snapshot = Snapshot::builder()
            .cpuid(1, 0, Registers::new(1, 1, 1, 1))
            .cpuid(1, 0, Registers::new(2, 2, 2, 2))
            .build();
        assert_eq!(snapshot.cpuid.len(), 1);
        assert_eq!(snapshot.cpuid(1, 0).eax, 2);
    }

    #[test]
    fn test_recorded_probe_replays_identically() -> Result<(), Box<dyn std::error::Error>> {
        let source = Snapshot::builder()
            .cpuid(0, 0, Registers::new(0x20, 0x756e_6547, 0x6c65_746e, 0x4965_6e69))
            .cpuid(1, 0, Registers::new(0, 0, 0b11 << 26, 0))
            .cpuid(7, 0, Registers::new(0, 0, 0, 1 << 24))
            .cpuid(0x1D, 0, Registers::new(1, 0, 0, 0))
            .cpuid(0x1D, 1, Registers::new(0x0400_2000, 0x0008_0040, 0x10, 0))
            .cpuid(0x1E, 0, Registers::new(0, 0x4010, 0, 0))
            .cpuid(0x3F, 0, Registers::new(9, 9, 9, 9))
            .xcr0(0x602E7)
            .build();

        let recorder = Recorder::new(&source);
        let live = probe::run(&recorder, &FeatureTable::amx());
        let captured = recorder.to_snapshot();

        // Only what the probe touched is captured.
        assert!(captured.cpuid.iter().all(|e| e.leaf != 0x3F));
        assert_eq!(captured.xcr0, 0x602E7);

        let temp_file = NamedTempFile::new()?;
        captured.save(temp_file.path())?;
        let loaded = Snapshot::load(temp_file.path())?;
        assert_eq!(loaded, captured);

        let replayed = probe::run(&loaded, &FeatureTable::amx());
        assert_eq!(replayed.features, live.features);
        assert_eq!(replayed.os_support, live.os_support);
        assert_eq!(replayed.vendor, "GenuineIntel");
        Ok(())
    }

    #[test]
    fn test_load_hand_written_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let mut temp_file = NamedTempFile::new()?;
        write!(
            temp_file,
            r#"{{"cpuid": [{{"leaf": 0, "subleaf": 0, "eax": 6, "ebx": 0, "ecx": 0, "edx": 0}}]}}"#
        )?;
        let snapshot = Snapshot::load(temp_file.path())?;
        assert_eq!(snapshot.xcr0, 0);
        assert_eq!(snapshot.cpuid(0, 0).eax, 6);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Snapshot::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}
