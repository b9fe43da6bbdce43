use anyhow::{Context as _, Result};
use std::{collections::HashSet, fs::File, path::PathBuf};
use strum::IntoEnumIterator;
use tiger_mips::{
    codegen::{self, reg_alloc::AllocatorKind},
    Compiler, Error, Options,
};

const TEST_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", "tests");

const IR_FILES: [&str; 3] = ["sum.ir", "arrays.ir", "floats.ir"];

const JUMPS: [&str; 10] = [
    "j", "jal", "beq", "bne", "blt", "bgt", "ble", "bge", "bc1t", "bc1f",
];

fn compile_file(file_name: &str, allocator: AllocatorKind) -> Result<Vec<String>> {
    let path = PathBuf::from(TEST_DIR).join("ir").join(file_name);
    let file =
        File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut asm = Vec::new();
    Compiler::new(file_name, file, &mut asm)
        .with_options(Options::new().allocator(allocator))
        .compile()?;

    let asm = String::from_utf8(asm).context("assembly is not utf-8")?;
    Ok(asm.lines().map(String::from).collect())
}

fn compile_str(src: &str, allocator: AllocatorKind) -> Result<Vec<String>, Error> {
    let mut asm = Vec::new();
    Compiler::new("inline.ir", src.as_bytes(), &mut asm)
        .with_options(Options::new().allocator(allocator))
        .compile()?;
    Ok(String::from_utf8_lossy(&asm).lines().map(String::from).collect())
}

fn uses_saved_registers(code: &[String]) -> bool {
    code.iter()
        .any(|line| (0..8).any(|n| line.contains(&format!("$s{}", n))))
}

#[test]
fn test_every_allocator() -> Result<()> {
    for file_name in IR_FILES {
        for allocator in AllocatorKind::iter() {
            let code = compile_file(file_name, allocator)
                .with_context(|| format!("{} with {}", file_name, allocator))?;

            assert_eq!(code.first().map(String::as_str), Some(".data"));
            assert!(code.iter().any(|line| line == ".text"));
            assert_eq!(code.last().map(String::as_str), Some("\tjr $ra"));

            let labels: Vec<&str> = code
                .iter()
                .filter(|line| !line.starts_with('\t') && line.ends_with(':'))
                .map(|line| line.trim_end_matches(':'))
                .collect();
            let unique: HashSet<&str> = labels.iter().copied().collect();
            assert_eq!(labels.len(), unique.len(), "{} with {}", file_name, allocator);

            for line in &code {
                let mut words = line.split_whitespace();
                let (Some(mnemonic), Some(target)) = (words.next(), words.last()) else {
                    continue;
                };
                if JUMPS.contains(&mnemonic) {
                    assert!(
                        unique.contains(target),
                        "{}: jump to undefined `{}` with {}",
                        file_name,
                        target,
                        allocator
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_naive_keeps_everything_in_memory() -> Result<()> {
    for file_name in IR_FILES {
        let code = compile_file(file_name, AllocatorKind::Naive)?;
        assert!(!uses_saved_registers(&code), "{}", file_name);
    }
    Ok(())
}

#[test]
fn test_intra_block_promotes_loop_variables() -> Result<()> {
    let code = compile_file("sum.ir", AllocatorKind::IntraBlock)?;
    // n@0, i@4
    let start = code
        .iter()
        .position(|line| line == "\tlw $s0, 4($sp)")
        .context("i is never reloaded")?;
    assert_eq!(code[start + 1], "\tlw $s1, total($zero)");

    let jump = code
        .iter()
        .position(|line| line == "\tj loop")
        .context("no back edge")?;
    assert_eq!(code[jump - 2], "\tsw $s0, 4($sp)");
    assert_eq!(code[jump - 1], "\tsw $s1, total($zero)");
    Ok(())
}

#[test]
fn test_global_uses_registers() -> Result<()> {
    for file_name in IR_FILES {
        let code = compile_file(file_name, AllocatorKind::Global)?;
        assert!(uses_saved_registers(&code), "{}", file_name);
    }
    Ok(())
}

#[test]
fn test_arrays_and_conversions() -> Result<()> {
    let code = compile_file("arrays.ir", AllocatorKind::Naive)?;
    let has = |expected: &str| code.iter().any(|line| line == expected);

    assert!(has("\ttable: .space 16"));
    assert!(has("\tscale: .space 4"));
    assert!(has("\tsw $t1, table($t0)"));
    assert!(has("\tadd $t0, $t0, $sp"));
    assert!(has("\tjal sum"));
    assert!(has("\tl.s $f6, scale($zero)"));
    assert!(has("\tmul.s $f8, $f4, $f6"));
    assert!(has("\tcvt.s.w $f4, $f4"));
    assert!(has("\tjal _lprintf"));

    let code = compile_file("floats.ir", AllocatorKind::Naive)?;
    assert!(code.iter().any(|line| line == "\tdiv.s $f8, $f4, $f6"));
    assert!(code.iter().any(|line| line == "\tbc1f bigger"));
    assert!(code.iter().any(|line| line == "\tjal _lexit"));
    Ok(())
}

#[test]
fn test_errors() {
    let err = compile_str(
        "start_function\nvoid main():\nmain:\nbreq, 1, 1, nowhere\nend_function\n",
        AllocatorKind::Global,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Codegen(codegen::Error::UndefinedLabel { ref label, .. }) if label == "nowhere"
    ));

    let err = compile_str(
        "start_function\nvoid main():\nint-list: i\nfloat-list: x\nmain:\nassign, i, x\nend_function\n",
        AllocatorKind::IntraBlock,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Codegen(codegen::Error::NarrowingConversion(_))
    ));

    let err = compile_str("start_function\nvoid main():\n", AllocatorKind::Naive).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().starts_with("file: inline.ir, line: 2"));
}
