use crate::core::probe::{Availability, ProbeReport};
use crate::platform::linux::XcompPermissions;
use std::io::{self, Write};

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn write_permissions<W: Write>(out: &mut W, permissions: &XcompPermissions) -> io::Result<()> {
    writeln!(
        out,
        "Kernel supports dynamic XTILEDATA: {}",
        yes_no(permissions.kernel_supports_tile_data())
    )?;
    writeln!(
        out,
        "XTILEDATA permitted for this process: {}",
        yes_no(permissions.tile_data_permitted())
    )?;
    if permissions.kernel_supports_tile_data() && !permissions.tile_data_permitted() {
        writeln!(out, "   (a process must request it with arch_prctl(ARCH_REQ_XCOMP_PERM) before using AMX)")?;
    }
    Ok(())
}

/// Console form: one block per decoded field, then the OS verdict.
pub fn write_text<W: Write>(out: &mut W, report: &ProbeReport) -> io::Result<()> {
    writeln!(out, "CPU vendor: {} (max basic leaf {:#04x})", report.vendor, report.max_leaf)?;

    writeln!(out, "{}", report.availability)?;
    if report.availability != Availability::Present {
        return Ok(());
    }

    for record in &report.features {
        writeln!(out)?;
        writeln!(out, "{}", record)?;
    }

    if let Some(os_support) = &report.os_support {
        writeln!(out)?;
        writeln!(out, "{}", os_support)?;
        if let Some(xcr0) = os_support.xcr0() {
            writeln!(
                out,
                "XCR0 = {:#x} [{}]",
                xcr0.bits(),
                xcr0.component_names().join(" ")
            )?;
        }
    }

    if let Some(permissions) = &report.permissions {
        write_permissions(out, permissions)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, report: &ProbeReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hardware::Registers;
    use crate::core::probe;
    use crate::core::table::FeatureTable;
    use crate::platform::snapshot::Snapshot;

    fn amx_machine() -> Snapshot {
        Snapshot::builder()
            .cpuid(0, 0, Registers::new(0x20, 0x756e_6547, 0x6c65_746e, 0x4965_6e69))
            .cpuid(1, 0, Registers::new(0, 0, 0b11 << 26, 0))
            .cpuid(7, 0, Registers::new(0, 0, 0, 0x0340_0000))
            .cpuid(0x1D, 0, Registers::new(1, 0, 0, 0))
            .cpuid(0x1D, 1, Registers::new(0x0400_2000, 0x0008_0040, 0x10, 0))
            .cpuid(0x1E, 0, Registers::new(0, 0x4010, 0, 0))
            .xcr0(0x602E7)
            .build()
    }

    fn render(report: &ProbeReport) -> String {
        let mut buf = Vec::new();
        write_text(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_text_report_not_supported() {
        let snapshot = Snapshot::builder()
            .cpuid(0, 0, Registers::new(6, 0x756e_6547, 0x6c65_746e, 0x4965_6e69))
            .build();
        let report = probe::run(&snapshot, &FeatureTable::amx());
        assert_eq!(
            render(&report),
            "CPU vendor: GenuineIntel (max basic leaf 0x06)\nAMX not supported\n"
        );
    }

    #[test]
    fn test_text_report_supported() {
        let report = probe::run(&amx_machine(), &FeatureTable::amx());
        let text = render(&report);

        assert!(text.starts_with("CPU vendor: GenuineIntel (max basic leaf 0x20)\nAMX supported\n\nCPUID.07H.00H:EDX[22] = 1\n"));
        assert!(text.contains("\nCPUID.07H.00H:EDX[24] = 1\n   AMX-TILE - "));
        assert!(text.contains("\nCPUID.1dH.01H:EAX[31:16] = 1024\n"));
        assert!(text.contains("\nCPUID.1eH.00H:EBX[23:8] = 64\n"));
        // 7.1 and 1E.1 are not implemented on this part
        assert!(!text.contains("CPUID.07H.01H"));
        assert!(!text.contains("CPUID.1eH.01H"));
        assert!(text.ends_with(
            "\nAMX state is supported by the OS\nXCR0 = 0x602e7 [X87 SSE AVX OPMASK ZMM_HI256 HI16_ZMM PKRU XTILECFG XTILEDATA]\n"
        ));
    }

    #[test]
    fn test_text_report_permissions() {
        let report = probe::run(&amx_machine(), &FeatureTable::amx()).with_permissions(Some(
            XcompPermissions {
                supported: 0x602E7,
                permitted: 0x202E7,
            },
        ));
        let text = render(&report);
        assert!(text.contains("Kernel supports dynamic XTILEDATA: yes\n"));
        assert!(text.contains("XTILEDATA permitted for this process: no\n"));
        assert!(text.contains("ARCH_REQ_XCOMP_PERM"));
    }

    #[test]
    fn test_json_report() {
        let report = probe::run(&amx_machine(), &FeatureTable::amx());
        let mut buf = Vec::new();
        write_json(&mut buf, &report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["vendor"], "GenuineIntel");
        assert_eq!(value["availability"], "present");
        assert_eq!(value["os_support"]["status"], "supported");
        assert_eq!(value["os_support"]["xcr0"], 0x602E7);
        assert!(value.get("permissions").is_none());

        let tile = &value["features"][1];
        assert_eq!(tile["name"], "AMX-TILE");
        assert_eq!(tile["register"], "EDX");
        assert_eq!(tile["value"], 1);
    }
}
