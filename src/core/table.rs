use crate::core::bits;
use crate::core::hardware::{Register, Registers};
use crate::error::TableError;

/// Leaf value the C tables use as an end-of-table marker. Never a valid entry here.
pub const INVALID_LEAF: u32 = 0xFFFF_FFFF;

/// One named field inside a CPUID leaf / sub-leaf.
///
/// Construct with [`FeatureDescriptor::bit`] or [`FeatureDescriptor::range`]; both
/// check `start <= stop <= 31`, which makes a bad entry in a `static` table a
/// compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDescriptor {
    leaf: u32,
    subleaf: u32,
    register: Register,
    start_bit: u32,
    stop_bit: u32,
    name: &'static str,
    description: &'static str,
}

impl FeatureDescriptor {
    pub const fn bit(
        leaf: u32,
        subleaf: u32,
        register: Register,
        bit: u32,
        name: &'static str,
        description: &'static str,
    ) -> Self {
        Self::range(leaf, subleaf, register, bit, bit, name, description)
    }

    pub const fn range(
        leaf: u32,
        subleaf: u32,
        register: Register,
        start_bit: u32,
        stop_bit: u32,
        name: &'static str,
        description: &'static str,
    ) -> Self {
        assert!(start_bit <= stop_bit, "start bit above stop bit");
        assert!(stop_bit <= 31, "CPUID registers are 32 bits wide");
        Self {
            leaf,
            subleaf,
            register,
            start_bit,
            stop_bit,
            name,
            description,
        }
    }

    pub const fn leaf(&self) -> u32 {
        self.leaf
    }

    pub const fn subleaf(&self) -> u32 {
        self.subleaf
    }

    pub const fn register(&self) -> Register {
        self.register
    }

    pub const fn start_bit(&self) -> u32 {
        self.start_bit
    }

    pub const fn stop_bit(&self) -> u32 {
        self.stop_bit
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn is_single_bit(&self) -> bool {
        self.start_bit == self.stop_bit
    }

    /// Pull this field's value out of a CPUID result.
    pub const fn extract(&self, registers: &Registers) -> u32 {
        let value = registers.get(self.register);
        if self.is_single_bit() {
            bits::bit(value, self.start_bit)
        } else if self.start_bit == 0 && self.stop_bit == 31 {
            value
        } else {
            bits::field(value, self.start_bit, self.stop_bit)
        }
    }
}

/// A feature table whose ordering has been checked.
///
/// Entries of one leaf are contiguous and the group opens at sub-leaf 0, whose EAX
/// reports the highest supported sub-leaf. Each (leaf, sub-leaf) pair forms one run.
#[derive(Debug, Clone, Copy)]
pub struct FeatureTable {
    entries: &'static [FeatureDescriptor],
}

impl FeatureTable {
    pub const fn new(entries: &'static [FeatureDescriptor]) -> Result<Self, TableError> {
        match Self::validate(entries) {
            Ok(()) => Ok(Self { entries }),
            Err(e) => Err(e),
        }
    }

    /// The built-in AMX table.
    pub const fn amx() -> Self {
        Self {
            entries: &AMX_FEATURES,
        }
    }

    pub const fn entries(&self) -> &'static [FeatureDescriptor] {
        self.entries
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct (leaf, sub-leaf) queries the table can issue.
    pub fn query_count(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                *i == 0
                    || self.entries[i - 1].leaf != e.leaf
                    || self.entries[i - 1].subleaf != e.subleaf
            })
            .count()
    }

    pub const fn validate(entries: &[FeatureDescriptor]) -> Result<(), TableError> {
        if entries.is_empty() {
            return Err(TableError::Empty);
        }
        if entries[0].subleaf != 0 {
            return Err(TableError::FirstNotSubleafZero {
                leaf: entries[0].leaf,
            });
        }

        let mut index = 0;
        while index < entries.len() {
            let entry = &entries[index];
            if entry.leaf == INVALID_LEAF {
                return Err(TableError::ReservedLeaf {
                    index,
                    leaf: entry.leaf,
                });
            }

            if index > 0 {
                let prev = &entries[index - 1];
                if prev.leaf != entry.leaf {
                    if entry.subleaf != 0 {
                        return Err(TableError::GroupNotAtSubleafZero {
                            index,
                            leaf: entry.leaf,
                            subleaf: entry.subleaf,
                        });
                    }
                    if Self::seen_before(entries, index, entry.leaf, None) {
                        return Err(TableError::SplitGroup {
                            index,
                            leaf: entry.leaf,
                        });
                    }
                } else if prev.subleaf != entry.subleaf
                    && Self::seen_before(entries, index, entry.leaf, Some(entry.subleaf))
                {
                    return Err(TableError::SplitQuery {
                        index,
                        leaf: entry.leaf,
                        subleaf: entry.subleaf,
                    });
                }
            }
            index += 1;
        }
        Ok(())
    }

    const fn seen_before(
        entries: &[FeatureDescriptor],
        end: usize,
        leaf: u32,
        subleaf: Option<u32>,
    ) -> bool {
        let mut i = 0;
        while i < end {
            let e = &entries[i];
            if e.leaf == leaf {
                match subleaf {
                    None => return true,
                    Some(s) if s == e.subleaf => return true,
                    Some(_) => {}
                }
            }
            i += 1;
        }
        false
    }
}

use Register::{Eax, Ebx, Ecx, Edx};
type F = FeatureDescriptor;

/// AMX-related CPUID fields, per the Intel SDM / ISE reference.
pub const AMX_FEATURES: [FeatureDescriptor; 22] = [
    // CPUID 07H - Structured Extended Feature Flags
    F::bit(0x07, 0, Edx, 22, "AMX-BF16", "If 1, the processor supports tile computational operations on bfloat16 numbers."),
    F::bit(0x07, 0, Edx, 24, "AMX-TILE", "If 1, the processor supports tile architecture."),
    F::bit(0x07, 0, Edx, 25, "AMX-INT8", "If 1, the processor supports tile computational operations on 8-bit integers."),
    F::bit(0x07, 1, Eax, 21, "AMX-FP16", "If 1, the processor supports tile computational operations on FP16 numbers."),
    F::bit(0x07, 1, Edx, 8, "AMX-COMPLEX", "If 1, supports the AMX-COMPLEX instructions."),
    // CPUID 1DH - Tile Information
    F::range(0x1D, 0, Eax, 0, 31, "max_palette", "Highest numbered palette Sub-leaf. Value = 1."),
    F::range(0x1D, 1, Eax, 0, 15, "Total Tile Bytes", "Palette 1 total_tile_bytes. Value = 8192."),
    F::range(0x1D, 1, Eax, 16, 31, "Bytes Per Tile", "Palette 1 bytes_per_tile. Value = 1024."),
    F::range(0x1D, 1, Ebx, 0, 15, "Bytes Per Row", "Palette 1 bytes_per_row. Value = 64."),
    F::range(0x1D, 1, Ebx, 16, 31, "Max Names", "Palette 1 max_names (number of tile registers). Value = 8."),
    F::range(0x1D, 1, Ecx, 0, 15, "Max Rows", "Palette 1 max_rows. Value = 16."),
    // CPUID 1EH - TMUL Information
    F::range(0x1E, 0, Ebx, 0, 7, "tmul_maxk", "tmul_maxk (rows or columns). Value = 16."),
    F::range(0x1E, 0, Ebx, 8, 23, "tmul_maxn", "tmul_maxn (column bytes). Value = 64."),
    F::bit(0x1E, 1, Eax, 0, "AMX-INT8", "If 1, the processor supports tile computational operations on 8-bit integers."),
    F::bit(0x1E, 1, Eax, 1, "AMX-BF16", "If 1, the processor supports tile computational operations on bfloat16 numbers."),
    F::bit(0x1E, 1, Eax, 2, "AMX-COMPLEX", "If 1, supports the AMX-COMPLEX instructions."),
    F::bit(0x1E, 1, Eax, 3, "AMX-FP16", "If 1, the processor supports tile computational operations on FP16 numbers."),
    F::bit(0x1E, 1, Eax, 4, "AMX-FP8", "If 1, supports Intel AMX computations for the FP8 data type."),
    F::bit(0x1E, 1, Eax, 5, "AMX-TRANSPOSE", "If 1, supports the AMX-TRANSPOSE instructions."),
    F::bit(0x1E, 1, Eax, 6, "AMX-TF32 (FP19)", "If 1, supports the AMX-TF32 (FP19) instructions."),
    F::bit(0x1E, 1, Eax, 7, "AMX-AVX512", "If 1, supports the AMX-AVX512 instructions."),
    F::bit(0x1E, 1, Eax, 8, "AMX-MOVRS", "If 1, supports the AMX-MOVRS instructions."),
];

// Ordering of the built-in table is checked at build time.
const _: () = assert!(FeatureTable::validate(&AMX_FEATURES).is_ok());

#[cfg(test)]
mod tests {
    use super::*;

    static SPLIT_GROUP: [FeatureDescriptor; 3] = [
        F::bit(7, 0, Edx, 24, "a", ""),
        F::bit(0x1D, 0, Eax, 0, "b", ""),
        F::bit(7, 0, Edx, 25, "c", ""),
    ];

    static GROUP_AT_SUBLEAF_ONE: [FeatureDescriptor; 2] = [
        F::bit(7, 0, Edx, 24, "a", ""),
        F::bit(0x1E, 1, Eax, 0, "b", ""),
    ];

    static SPLIT_QUERY: [FeatureDescriptor; 3] = [
        F::bit(7, 0, Edx, 24, "a", ""),
        F::bit(7, 1, Eax, 21, "b", ""),
        F::bit(7, 0, Edx, 25, "c", ""),
    ];

    static SENTINEL: [FeatureDescriptor; 2] = [
        F::bit(7, 0, Edx, 24, "a", ""),
        F::bit(INVALID_LEAF, 0, Eax, 0, "", ""),
    ];

    static FIRST_AT_SUBLEAF_ONE: [FeatureDescriptor; 1] = [F::bit(7, 1, Eax, 21, "a", "")];

    static EMPTY: [FeatureDescriptor; 0] = [];

    #[test]
    fn test_builtin_table_is_valid() {
        let table = FeatureTable::new(&AMX_FEATURES).expect("built-in table");
        assert_eq!(table.len(), AMX_FEATURES.len());
        assert_eq!(FeatureTable::amx().len(), 22);
        // (7,0) (7,1) (1D,0) (1D,1) (1E,0) (1E,1)
        assert_eq!(table.query_count(), 6);
        assert_eq!(table.entries()[0].subleaf(), 0);
    }

    #[test]
    fn test_rejects_bad_ordering() {
        assert_eq!(FeatureTable::new(&EMPTY).unwrap_err(), TableError::Empty);
        assert_eq!(
            FeatureTable::new(&FIRST_AT_SUBLEAF_ONE).unwrap_err(),
            TableError::FirstNotSubleafZero { leaf: 7 }
        );
        assert_eq!(
            FeatureTable::new(&SPLIT_GROUP).unwrap_err(),
            TableError::SplitGroup { index: 2, leaf: 7 }
        );
        assert_eq!(
            FeatureTable::new(&GROUP_AT_SUBLEAF_ONE).unwrap_err(),
            TableError::GroupNotAtSubleafZero { index: 1, leaf: 0x1E, subleaf: 1 }
        );
        assert_eq!(
            FeatureTable::new(&SPLIT_QUERY).unwrap_err(),
            TableError::SplitQuery { index: 2, leaf: 7, subleaf: 0 }
        );
        assert_eq!(
            FeatureTable::new(&SENTINEL).unwrap_err(),
            TableError::ReservedLeaf { index: 1, leaf: INVALID_LEAF }
        );
    }

    #[test]
    fn test_extract_single_bit() {
        let d = F::bit(7, 0, Edx, 24, "AMX-TILE", "");
        assert_eq!(d.extract(&Registers::new(0, 0, 0, 0x0100_0000)), 1);
        assert_eq!(d.extract(&Registers::new(0, 0, 0, 0x0200_0000)), 0);

        let d = F::bit(7, 0, Eax, 24, "", "");
        assert_eq!(d.extract(&Registers::new(0x0000_0001, 0, 0, 0)), 0);
        let d = F::bit(7, 0, Eax, 0, "", "");
        assert_eq!(d.extract(&Registers::new(0x0000_0001, 0, 0, 0)), 1);
    }

    #[test]
    fn test_single_bits_are_boolean() {
        let all_ones = Registers::new(u32::MAX, u32::MAX, u32::MAX, u32::MAX);
        for d in AMX_FEATURES.iter().filter(|d| d.is_single_bit()) {
            assert_eq!(d.extract(&all_ones), 1, "{}", d.name());
            assert_eq!(d.extract(&Registers::default()), 0, "{}", d.name());
        }
    }

    #[test]
    fn test_full_register_is_verbatim() {
        let regs = Registers::new(0x8000_0001, 0, 0, 0);
        for d in AMX_FEATURES
            .iter()
            .filter(|d| d.start_bit() == 0 && d.stop_bit() == 31)
        {
            assert_eq!(d.extract(&regs), regs.get(d.register()));
        }
    }

    #[test]
    fn test_extract_range() {
        let d = F::range(0x1D, 1, Ebx, 4, 7, "", "");
        assert_eq!(d.extract(&Registers::new(0, u32::MAX, 0, 0)), 0xF);
        let d = F::range(0x1D, 1, Ebx, 16, 31, "Max Names", "");
        assert_eq!(d.extract(&Registers::new(0, 0x0008_0040, 0, 0)), 8);
    }
}
