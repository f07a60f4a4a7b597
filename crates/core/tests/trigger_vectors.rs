//! Every comparison shape the normalizer rewrites must also lower to
//! requirements, unless it is decided outright.

use trigscript_core::{compile_trigger, serialize_trigger, ErrorKind};

const COMPARISONS: &[&str] = &[
    "1 == byte(2)",
    "1 < byte(2)",
    "1 >= byte(2)",
    "byte(1) == 3.14",
    "byte(1) != 3.14",
    "byte(1) < 3.14",
    "byte(1) >= 3.14",
    "float(1) == 3.14",
    "byte(1) + 1 < byte(2) + 1",
    "byte(1) * 2 + 1 == byte(2) * 2 + 1",
    "byte(1) + 6 < byte(2) + 3",
    "byte(1) - 1 == 4",
    "byte(1) + 1.2 == 4.8",
    "byte(1) * 10 == 100",
    "byte(1) * 10.0 == 99",
    "float(1) * 10 == 99",
    "float(1) * 2.2 == 7.4",
    "byte(1) * 2.2 == 6.6",
    "byte(1) * 10 != 100",
    "byte(1) * 10 < 99",
    "byte(1) * 10 >= 90",
    "byte(1) / 10 == 4",
    "byte(1) / 10 < 9",
    "byte(1) * 10 * 2 == 100",
    "2 * byte(1) * 10 == 100",
    "2.2 * byte(1) * 10 == 100",
    "2.2 * float(1) * 10 == 100",
    "byte(1) * 10 / 2 == 100",
    "byte(1) * 10 / 3 == 100",
    "byte(1) * 10 + 10 == 100",
    "byte(1) * 10 - 10 == 100",
    "(byte(1) - 1) * 10 == 100",
    "(byte(1) - 1) / 10 == 10",
    "(byte(1) - 1) * 10 < 99",
    "byte(1) * 10 + byte(2) == 100",
    "byte(1) * 10 == byte(2)",
    "byte(1) + 3 == prev(byte(1))",
    "byte(1) == prev(byte(1)) - 3",
    "prev(byte(1)) - byte(1) == 3",
    "byte(1) - 3 == prev(byte(1))",
    "byte(1) == prev(byte(1)) + 3",
    "0 + byte(1) - 9 == 0",
    "bcd(byte(1)) == 24",
    "byte(1) != bcd(byte(2))",
    "bcd(byte(1)) != prev(bcd(byte(1)))",
    "byte(1) / byte(2) < 0.8",
    "byte(1) / byte(2) * 100.0 > 75",
    "byte(1) - 10 <= byte(2)",
    "byte(1) > byte(2) + 10",
    "byte(1) == byte(2) + 10",
    "byte(1) - byte(2) < 3",
    "byte(1) - byte(2) > -3",
    "byte(1) + 1 - byte(2) > 3",
    "byte(1) + 1 - byte(2) <= 2",
    "byte(1) + 1 - byte(2) < -3",
    "byte(1) - byte(2) + 355 > 255",
    "5 - byte(1) == 2",
    "300 - byte(1) < 100",
    "byte(1) + byte(2) - byte(3) < 100",
    "byte(1) - byte(2) - byte(3) + 300 < 100",
    "byte(1) - 100 > byte(2) - byte(3)",
    "byte(1) * 2 - byte(2) < 3",
    "byte(1) - byte(2) * 2 < 3",
    "byte(1) / 2 - byte(2) < 3",
    "byte(1) - byte(2) / 2 < 3",
    "byte(1) / byte(1) - (byte(2) / byte(2)) >= 1",
    "byte(1) / byte(2) - (byte(2) / byte(3)) >= 1",
    "byte(1) / byte(1) - 2 > (byte(2) / byte(2))",
    "byte(1) / byte(2) - 2 > (byte(2) / byte(3))",
    "byte(byte(2) + 1) - byte(byte(3) + 2) > 100",
    "word(54) + 37 >= word(word(43102) + 54)",
    "word(1) - word(2) + word(3) < 100",
    "dword(1) - dword(2) + dword(3) < 100",
    "byte(dword(1)) - byte(dword(2)) + byte(dword(3)) < 100",
    "dword(1) - byte(2) < 100",
    "bit1(1) + bit2(1) < bit3(1) + bit4(1) + 1",
    "bit1(1) + bit2(1) + 2 - bit3(1) - bit4(1) < 3",
    "(word(1) - word(2)) > 0 && (word(1) - word(2)) < 0x8000",
    "byte(1) - byte(1) == 0",
];

/// Shapes no requirement chain can express: the division applies to an
/// accumulated product.
const UNREPRESENTABLE: &[&str] = &["byte(1) * 100.0 / byte(2) > 75"];

#[test]
fn every_comparison_lowers_or_is_decided() {
    for src in COMPARISONS {
        if UNREPRESENTABLE.contains(src) {
            continue;
        }
        match compile_trigger(None, src) {
            Ok((_, trigger)) => assert!(
                !trigger.core.requirements.is_empty(),
                "{} produced no requirements",
                src
            ),
            Err(e) => assert!(
                matches!(e.kind, ErrorKind::NeverTrue | ErrorKind::AlwaysTrue),
                "{} failed to compile: {}",
                src,
                e
            ),
        }
    }
}

#[test]
fn accumulated_division_is_left_as_written() {
    for src in UNREPRESENTABLE {
        let err = compile_trigger(None, src).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Semantic);
        assert!(
            err.innermost().message.starts_with("Cannot represent"),
            "{}: {}",
            src,
            err
        );
    }
}

#[test]
fn folded_shapes_serialize() {
    let cases = [
        ("byte(1) * 10 / 3 == 100", "byte(1) == 30", "0xH000001=30"),
        ("2.2 * float(1) * 10 == 100", "float(1) == 4.545455", "fF000001=f4.545455"),
        (
            "word(1) - word(2) + word(3) < 100",
            "word(1) - word(2) + word(3) + 65535 < 65635",
            "A:65535_A:0x 000001_B:0x 000002_0x 000003<65635",
        ),
        (
            "byte(1) / 2 - byte(2) < 3",
            "byte(1) / 2 - byte(2) + 255 < 258",
            "A:255_A:0xH000001/2_B:0xH000002_0<258",
        ),
    ];
    for (src, expression, wire) in cases {
        let (normalized, trigger) = compile_trigger(None, src).unwrap();
        assert_eq!(normalized.to_string(), expression, "normalizing {}", src);
        assert_eq!(serialize_trigger(&trigger), wire, "lowering {}", src);
    }
}
