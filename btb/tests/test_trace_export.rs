mod common;

use std::fs;

use btb::context::TraceContext;
use btb::domain::{CpuId, RenderError};
use btb::export::{
    MemorySink, OutputMode, OutputStreams, RenderOptions, Renderer, DURATIONS_HEADER, HISTOGRAM_HEADER,
};
use btb::format::TraceBuffer;
use btb::symbolization::SymbolTables;
use btb_common::RecordType;
use common::{symbol_table, BufferBuilder, MAPPING_ATTRIBUTES, STACK_ATTRIBUTES, STATS_ATTRIBUTES};

/// Two CPUs, one library, three stack samples and one histogram
fn sample_trace() -> TraceBuffer {
    BufferBuilder::new()
        .info(3, &[STACK_ATTRIBUTES, MAPPING_ATTRIBUTES, &[], &[], STATS_ATTRIBUTES])
        .mapping(&[50, 0x1000, 7], "libfoo")
        .record(RecordType::Stack, &[0, 100, 10, 7], &[0x1010, 0x1000])
        .record(RecordType::Stack, &[1, 150, 20, 7], &[0x1010])
        .record(RecordType::Stack, &[0, 200, 5, 7], &[0x9999])
        .record(RecordType::Stats, &[1, 300, 2, 4], &[3, 0, 300, 0])
        .build()
}

fn sample_context(buffer: &TraceBuffer) -> (TraceContext, btb::format::EntryArray) {
    let symbols: SymbolTables =
        vec![symbol_table("libfoo", &[("foo_main", 0x0, 0x10), ("_ZN3foo4stepE", 0x10, 0x10)])]
            .into_iter()
            .collect();
    let mut context = TraceContext::new(symbols);
    let entries = context.decode(buffer).unwrap();
    (context, entries)
}

fn render(mode: OutputMode, options: RenderOptions, split: bool) -> MemorySink {
    let buffer = sample_trace();
    let (context, entries) = sample_context(&buffer);
    let mut sink = MemorySink::new(split);
    Renderer::new(&context, &buffer, mode, options).render(&entries, &mut sink).unwrap();
    sink
}

#[test]
fn test_folded_weights_from_time() {
    let sink = render(OutputMode::Folded, RenderOptions::default(), false);
    assert_eq!(
        sink.common,
        vec![
            "libfoo`foo_main;libfoo`foo::step 1",
            // 150 - (100 + 10)
            "libfoo`foo::step 40",
            // 200 - (150 + 20)
            "7/0000000000009999 30",
        ]
    );
}

#[test]
fn test_folded_unit_weights_per_cpu() {
    let options = RenderOptions { unit_weights: true, ..RenderOptions::default() };
    let sink = render(OutputMode::Folded, options, true);

    assert_eq!(sink.common[0], "cpu_0;libfoo`foo_main;libfoo`foo::step 1");
    assert!(sink.common.iter().all(|line| line.ends_with(" 1")));
    assert_eq!(sink.per_cpu[&CpuId(0)].len(), 2);
    assert_eq!(sink.per_cpu[&CpuId(1)], vec!["cpu_1;libfoo`foo::step 1"]);
}

#[test]
fn test_histogram() {
    let sink = render(OutputMode::Histogram, RenderOptions::default(), false);
    assert_eq!(
        sink.common,
        vec![HISTOGRAM_HEADER, "0,0,4,3,100.000000", "1,4,8,0,0.000000"]
    );
}

#[test]
fn test_durations_intervals() {
    let buffer = BufferBuilder::new()
        .info(3, &[&["cpu_id", "tsc_time", "tsc_duration", "timer_step", "stack_depth"]])
        .record(RecordType::Stack, &[0, 100, 10, 1, 3], &[])
        .record(RecordType::Stack, &[1, 130, 12, 2, 4], &[])
        .record(RecordType::Stack, &[0, 190, 9, 3, 2], &[])
        .build();
    let mut context = TraceContext::default();
    let entries = context.decode(&buffer).unwrap();
    let mut sink = MemorySink::new(true);
    Renderer::new(&context, &buffer, OutputMode::Durations, RenderOptions::default())
        .render(&entries, &mut sink)
        .unwrap();

    // intervals are measured from the previous sample on any CPU
    assert_eq!(sink.common, vec![DURATIONS_HEADER, "1,3,10,0", "2,4,12,30", "3,2,9,60"]);
    assert_eq!(sink.per_cpu[&CpuId(0)], vec![DURATIONS_HEADER, "1,3,10,0", "3,2,9,60"]);
    assert_eq!(sink.per_cpu[&CpuId(1)], vec![DURATIONS_HEADER, "2,4,12,30"]);
}

#[test]
fn test_raw_dump() {
    let sink = render(OutputMode::Raw, RenderOptions::default(), true);
    assert_eq!(sink.common.len(), 5);

    let mapping = &sink.common[0];
    let name_word = u64::from_le_bytes(*b"libfoo\0\0");
    assert!(mapping.starts_with("read entry: \n"));
    assert!(mapping.contains(&format!("\n  {:16}: {:16x}\n", "entry_type", 2)));
    assert!(mapping.contains(&format!("\n  {:16}: {:16x} 4096\n", "mapping_base", 0x1000)));
    assert!(mapping.ends_with(&format!("\n  {:15} : {name_word:16x} libfoo", 0)));

    let stack = &sink.common[1];
    assert!(stack.contains(&format!("\n  {:16}: {:16x}   0.000000100 s\n", "tsc_time", 100)));
    assert!(stack.contains(&format!("\n  {:16}: {:16x}         0.010 µs\n", "tsc_duration", 10)));
    assert!(stack.contains(&format!("\n  {:16}: {:16x} KERNEL, libfoo\n", "task_id", 7)));
    assert!(stack.contains(&format!("\n  {:15} : {:16x} libfoo`foo_main", 1, 0x1000)));

    // only stack records go to the per-CPU dumps
    assert_eq!(sink.per_cpu[&CpuId(0)].len(), 2);
    assert_eq!(sink.per_cpu[&CpuId(1)].len(), 1);
}

#[test]
fn test_btb_lines() {
    let buffer = sample_trace();
    let sink = render(OutputMode::BtbLines, RenderOptions::default(), false);

    // MAPPING record first: tag, length 6, tsc_time 50
    let first = &sink.common[0];
    assert!(first.starts_with("btb @"));
    assert!(first.contains(": 0000000000000002 0000000000000006 0000000000000032 "));

    // every word outside the INFO record appears exactly once
    let words_on_lines: usize =
        sink.common.iter().map(|line| line.split_once(": ").unwrap().1.split(' ').count()).sum();
    let info_words = usize::try_from(buffer.words()[1]).unwrap();
    assert_eq!(words_on_lines + info_words, buffer.len());
}

#[test]
fn test_missing_attribute_is_fatal_by_default() {
    // stack records without task_id cannot be symbolized
    let buffer = BufferBuilder::new()
        .info(3, &[&["cpu_id", "tsc_time", "tsc_duration"]])
        .record(RecordType::Stack, &[0, 100, 5], &[0x10])
        .build();
    let mut context = TraceContext::default();
    let entries = context.decode(&buffer).unwrap();

    let renderer = Renderer::new(&context, &buffer, OutputMode::Folded, RenderOptions::default());
    let err = renderer.render(&entries, &mut MemorySink::new(false)).unwrap_err();
    assert!(matches!(err.root(), RenderError::Decode(_)));
    assert!(err.root().to_string().contains("'task_id'"));
}

#[test]
fn test_lenient_mode_skips_bad_records() {
    let buffer = BufferBuilder::new()
        .info(3, &[STACK_ATTRIBUTES, MAPPING_ATTRIBUTES])
        .mapping(&[0, 0x1000, 7], "liba")
        .mapping(&[0, 0x1000, 7], "libb")
        .record(RecordType::Stack, &[0, 100, 5, 7], &[0x1010])
        .record(RecordType::Stack, &[0, 200, 5, 7], &[0x5000])
        .build();
    let symbols: SymbolTables = vec![
        symbol_table("liba", &[("a", 0x0, 0x100)]),
        symbol_table("libb", &[("b", 0x0, 0x100)]),
    ]
    .into_iter()
    .collect();
    let mut context = TraceContext::new(symbols);
    let entries = context.decode(&buffer).unwrap();

    let strict = Renderer::new(&context, &buffer, OutputMode::Folded, RenderOptions::default());
    let err = strict.render(&entries, &mut MemorySink::new(false)).unwrap_err();
    assert!(matches!(err.root(), RenderError::Resolve(_)));
    // INFO: header, version, count, two lengths, seven names; MAPPING: header, three attributes, one name word
    let offset = (2 + 2 + 2 + 7 * 2) + 2 * (2 + 3 + 1);
    let msg = err.to_string();
    assert!(msg.contains(&format!("record 3 at word {offset}")), "{msg}");
    assert!(msg.contains("timestamp 100"), "{msg}");

    let options = RenderOptions { lenient: true, ..RenderOptions::default() };
    let mut sink = MemorySink::new(false);
    let stats = Renderer::new(&context, &buffer, OutputMode::Folded, options).render(&entries, &mut sink).unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.rendered, 1);
    assert_eq!(sink.common, vec!["7/0000000000005000 1"]);
}

#[test]
fn test_per_cpu_files() {
    let buffer = sample_trace();
    let (context, entries) = sample_context(&buffer);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.folded");

    let mut output = OutputStreams::create(&path, true).unwrap();
    Renderer::new(&context, &buffer, output.mode(), RenderOptions::default())
        .render(&entries, &mut output)
        .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    let cpu1 = fs::read_to_string(dir.path().join("trace-1.folded")).unwrap();
    assert_eq!(cpu1, "cpu_1;libfoo`foo::step 40\n");
    assert!(dir.path().join("trace-0.folded").is_file());
    assert!(!dir.path().join("trace-2.folded").exists());
}

#[test]
fn test_cli_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("trace.btb");
    let manifest = dir.path().join("binaries.list");
    let output = dir.path().join("trace.btb_lines");
    let trace = BufferBuilder::new().info(3, &[STACK_ATTRIBUTES]).record(RecordType::Stack, &[0, 1, 2, 3], &[4]);
    // INFO record: header, version, count, one length, four names
    let stack_offset = 2 + 3 + 4 * 2;
    fs::write(&input, trace.to_bytes()).unwrap();
    fs::write(&manifest, "").unwrap();

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_btb"))
        .arg(&input)
        .arg(&output)
        .arg("--binaries")
        .arg(&manifest)
        .arg("--quiet")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!(
            "btb @{stack_offset:16x}: 0000000000000001 0000000000000007 0000000000000000 \
             0000000000000001 0000000000000002 0000000000000003 0000000000000004\n"
        )
    );

    let bad_output = std::process::Command::new(env!("CARGO_BIN_EXE_btb"))
        .arg(&input)
        .arg(dir.path().join("trace.txt"))
        .arg("--binaries")
        .arg(&manifest)
        .status()
        .unwrap();
    assert_eq!(bad_output.code(), Some(1));

    let usage = std::process::Command::new(env!("CARGO_BIN_EXE_btb")).arg(&input).status().unwrap();
    assert_eq!(usage.code(), Some(2));
}
