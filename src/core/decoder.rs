//! Feature Decoder
//!
//! Walks a [`FeatureTable`] and reads each field from the processor, issuing
//! CPUID only when the (leaf, sub-leaf) pair changes. Sub-leaves above the
//! maximum reported by the group's sub-leaf 0 are never queried: many parts
//! return stale data for them.

use crate::core::hardware::{Processor, Register, Registers};
use crate::core::table::{FeatureDescriptor, FeatureTable};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

/// One decoded table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRecord {
    pub leaf: u32,
    pub subleaf: u32,
    pub register: Register,
    pub start_bit: u32,
    pub stop_bit: u32,
    pub value: u32,
    pub name: &'static str,
    pub description: &'static str,
}

impl FeatureRecord {
    fn new(descriptor: &FeatureDescriptor, registers: &Registers) -> Self {
        Self {
            leaf: descriptor.leaf(),
            subleaf: descriptor.subleaf(),
            register: descriptor.register(),
            start_bit: descriptor.start_bit(),
            stop_bit: descriptor.stop_bit(),
            value: descriptor.extract(registers),
            name: descriptor.name(),
            description: descriptor.description(),
        }
    }
}

impl fmt::Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPUID.{:02x}H.{:02x}H:{}", self.leaf, self.subleaf, self.register)?;
        if self.start_bit == self.stop_bit {
            writeln!(f, "[{}] = {}", self.start_bit, self.value)?;
        } else {
            writeln!(f, "[{}:{}] = {}", self.stop_bit, self.start_bit, self.value)?;
        }
        write!(f, "   {} - {}", self.name, self.description)
    }
}

/// Position of the walk: the query currently cached and the group's sub-leaf limit.
struct DecoderCursor {
    leaf: u32,
    subleaf: u32,
    max_subleaf: u32,
    registers: Registers,
}

impl DecoderCursor {
    /// Open a leaf group. `first` is the group's sub-leaf 0 entry.
    fn open<P: Processor + ?Sized>(cpu: &P, first: &FeatureDescriptor) -> Self {
        let registers = query(cpu, first.leaf(), first.subleaf());
        Self {
            leaf: first.leaf(),
            subleaf: first.subleaf(),
            max_subleaf: registers.eax,
            registers,
        }
    }

    /// Bring the cached query in line with `entry`. Returns false when the entry's
    /// sub-leaf is not implemented; the cache is left untouched in that case.
    fn advance<P: Processor + ?Sized>(&mut self, cpu: &P, entry: &FeatureDescriptor) -> bool {
        if entry.leaf() != self.leaf {
            *self = Self::open(cpu, entry);
            return true;
        }

        if entry.subleaf() != self.subleaf {
            if entry.subleaf() > self.max_subleaf {
                debug!(
                    leaf = entry.leaf(),
                    subleaf = entry.subleaf(),
                    max_subleaf = self.max_subleaf,
                    "skipping {}: sub-leaf not supported",
                    entry.name()
                );
                return false;
            }
            self.registers = query(cpu, self.leaf, entry.subleaf());
            self.subleaf = entry.subleaf();
        }
        true
    }
}

fn query<P: Processor + ?Sized>(cpu: &P, leaf: u32, subleaf: u32) -> Registers {
    let registers = cpu.cpuid(leaf, subleaf);
    trace!(leaf, subleaf, ?registers, "cpuid");
    registers
}

/// Decode every supported entry of `table`, in table order.
pub fn decode<P: Processor + ?Sized>(table: &FeatureTable, cpu: &P) -> Vec<FeatureRecord> {
    let entries = table.entries();
    let Some(first) = entries.first() else {
        return Vec::new();
    };

    let mut cursor = DecoderCursor::open(cpu, first);
    let mut records = Vec::with_capacity(entries.len());
    records.push(FeatureRecord::new(first, &cursor.registers));

    for entry in &entries[1..] {
        if cursor.advance(cpu, entry) {
            records.push(FeatureRecord::new(entry, &cursor.registers));
        }
    }

    debug!(
        decoded = records.len(),
        skipped = entries.len() - records.len(),
        "feature table decoded"
    );
    records
}
