//! Round-trip tests for the v5 unit codec.

use ixm::remap::PathPrefixMap;
use ixm::store;
use ixm::unit::{
    DependencyKind, Include, ModuleNameScope, UnitInfo, UnitReader, UnitWriter,
    unit_name_for_output_file,
};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("ixm_test_fixtures")
        .join(format!("codec_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("failed to create fixture dir");
    dir
}

fn sample_info() -> UnitInfo {
    UnitInfo {
        provider_identifier: "clang".to_string(),
        provider_version: "17.0.0".to_string(),
        working_directory: "/build".to_string(),
        output_file: "/build/obj/main.o".to_string(),
        main_file_path: "/build/src/main.c".to_string(),
        module_name: "Main".to_string(),
        target: "x86_64-unknown-linux-gnu".to_string(),
        sysroot_path: "/sysroot".to_string(),
        is_system_unit: false,
        is_module_unit: true,
        is_debug_compilation: true,
    }
}

fn write_sample_unit(store_root: &Path) -> PathBuf {
    store::init_store(store_root).unwrap();
    let prefix_map = PathPrefixMap::empty();
    let mut names = ModuleNameScope::new();
    let mut writer = UnitWriter::new(store_root, sample_info(), &prefix_map);

    let main_module = names.get_reference("Main");
    let dispatch = names.get_reference("Dispatch");
    let no_module = names.get_reference("");

    writer.add_unit_dependency("helper.o-1a2b3c", "/build/obj/helper.o", false, main_module);
    writer.add_record_dependency("main.c-9XK2M", "/build/src/main.c", false, no_module);
    writer.add_file_dependency("/usr/include/stdio.h", true, dispatch);
    writer.add_include("/build/src/main.c", 3, "/usr/include/stdio.h");
    writer.add_include("/build/src/main.c", 14, "/build/src/helper.h");

    writer.write(&names, |_| true).unwrap()
}

#[test]
fn test_header_round_trip() {
    let dir = fixture_dir("header");
    let unit_path = write_sample_unit(&dir);
    let reader = UnitReader::open(&unit_path).unwrap();

    assert_eq!(reader.provider_identifier(), "clang");
    assert_eq!(reader.provider_version(), "17.0.0");
    assert_eq!(reader.working_directory(), "/build");
    assert_eq!(reader.output_file(), "/build/obj/main.o");
    assert_eq!(reader.main_file_path(), "/build/src/main.c");
    assert_eq!(reader.module_name(), "Main");
    assert_eq!(reader.target(), "x86_64-unknown-linux-gnu");
    assert_eq!(reader.sysroot_path(), "/sysroot");
    assert!(!reader.is_system_unit());
    assert!(reader.is_module_unit());
    assert!(reader.is_debug_compilation());
}

#[test]
fn test_unit_file_name_matches_output_path_hash() {
    let dir = fixture_dir("name");
    let unit_path = write_sample_unit(&dir);
    let expected =
        unit_name_for_output_file("/build/obj/main.o", "/build", &PathPrefixMap::empty());
    assert_eq!(unit_path.file_name().unwrap().to_str().unwrap(), expected);
    assert!(unit_path.starts_with(store::units_dir(&dir)));
}

#[test]
fn test_dependencies_round_trip_in_order() {
    let dir = fixture_dir("deps");
    let unit_path = write_sample_unit(&dir);
    let reader = UnitReader::open(&unit_path).unwrap();

    let mut deps = Vec::new();
    let complete = reader
        .foreach_dependency(|dep| {
            deps.push((
                dep.kind,
                dep.is_system,
                dep.name.to_string(),
                dep.file_path.to_string(),
                dep.module_name.to_string(),
            ));
            true
        })
        .unwrap();
    assert!(complete);

    assert_eq!(
        deps,
        vec![
            (
                DependencyKind::Unit,
                false,
                "helper.o-1a2b3c".to_string(),
                "/build/obj/helper.o".to_string(),
                "Main".to_string(),
            ),
            (
                DependencyKind::Record,
                false,
                "main.c-9XK2M".to_string(),
                "/build/src/main.c".to_string(),
                String::new(),
            ),
            (
                DependencyKind::File,
                true,
                String::new(),
                "/usr/include/stdio.h".to_string(),
                "Dispatch".to_string(),
            ),
        ]
    );
}

#[test]
fn test_includes_round_trip_in_order() {
    let dir = fixture_dir("includes");
    let unit_path = write_sample_unit(&dir);
    let reader = UnitReader::open(&unit_path).unwrap();

    let mut includes = Vec::new();
    reader
        .foreach_include(|include| {
            includes.push((
                include.source_path.to_string(),
                include.source_line,
                include.target_path.to_string(),
            ));
            true
        })
        .unwrap();

    assert_eq!(
        includes,
        vec![
            ("/build/src/main.c".to_string(), 3, "/usr/include/stdio.h".to_string()),
            ("/build/src/main.c".to_string(), 14, "/build/src/helper.h".to_string()),
        ]
    );
}

#[test]
fn test_traversal_short_circuits() {
    let dir = fixture_dir("short_circuit");
    let unit_path = write_sample_unit(&dir);
    let reader = UnitReader::open(&unit_path).unwrap();

    let mut visited = 0;
    let complete = reader
        .foreach_dependency(|_| {
            visited += 1;
            false
        })
        .unwrap();
    assert!(!complete);
    assert_eq!(visited, 1);
}

#[test]
fn test_rewrite_is_byte_identical() {
    let first_store = fixture_dir("rewrite_a");
    let second_store = fixture_dir("rewrite_b");
    let unit_path = write_sample_unit(&first_store);
    let reader = UnitReader::open(&unit_path).unwrap();

    store::init_store(&second_store).unwrap();
    let prefix_map = PathPrefixMap::empty();
    let mut names = ModuleNameScope::new();
    let mut writer = UnitWriter::new(&second_store, reader.info().clone(), &prefix_map);

    reader
        .foreach_dependency(|dep| {
            let module = names.get_reference(dep.module_name);
            match dep.kind {
                DependencyKind::Unit => {
                    writer.add_unit_dependency(dep.name, dep.file_path, dep.is_system, module)
                }
                DependencyKind::Record => {
                    writer.add_record_dependency(dep.name, dep.file_path, dep.is_system, module)
                }
                DependencyKind::File => {
                    writer.add_file_dependency(dep.file_path, dep.is_system, module)
                }
            }
            true
        })
        .unwrap();
    reader
        .foreach_include(|include: &Include<'_>| {
            writer.add_include(include.source_path, include.source_line, include.target_path);
            true
        })
        .unwrap();

    let rewritten = writer.write(&names, |_| true).unwrap();
    assert_eq!(
        rewritten.file_name().unwrap(),
        unit_path.file_name().unwrap()
    );
    assert_eq!(fs::read(&unit_path).unwrap(), fs::read(&rewritten).unwrap());
}

#[test]
fn test_missing_unit_file_is_an_error() {
    let dir = fixture_dir("missing");
    let err = UnitReader::open(&dir.join("nope")).unwrap_err();
    assert!(format!("{:#}", err).contains("could not open unit file"));
}

#[test]
fn test_bad_magic_is_an_error() {
    let dir = fixture_dir("bad_magic");
    let path = dir.join("garbage");
    fs::write(&path, b"this is not a unit file at all").unwrap();
    let err = UnitReader::open(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("bad magic"));
}

#[test]
fn test_version_mismatch_is_an_error() {
    let dir = fixture_dir("bad_version");
    let path = dir.join("v4-unit");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"IXUN");
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 32]);
    fs::write(&path, &bytes).unwrap();
    let err = UnitReader::open(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("unsupported unit format version 4"));
}

#[test]
fn test_truncated_unit_file_is_an_error() {
    let dir = fixture_dir("truncated");
    let unit_path = write_sample_unit(&dir);
    let mut bytes = fs::read(&unit_path).unwrap();
    bytes.truncate(40);
    let path = dir.join("truncated-unit");
    fs::write(&path, &bytes).unwrap();
    assert!(UnitReader::open(&path).is_err());
}
