use std::fs;
use std::path::{Path, PathBuf};

use cpp_demangle::{DemangleOptions, Symbol as CppSymbol};
use log::{info, warn};
use object::{Object, ObjectSymbol};
use rustc_demangle::try_demangle;

use super::manifest::BinaryManifest;
use super::symbol_table::{ElfSymbol, SymbolTable, SymbolTables};
use crate::domain::ResourceError;

/// Demangle a Rust or Itanium C++ symbol name
///
/// Rust hashes are stripped. Names that are neither are returned unchanged.
#[must_use]
pub fn demangle_symbol(symbol: &str) -> String {
    if let Ok(demangled) = try_demangle(symbol) {
        return format!("{demangled:#}");
    }
    // bare type encodings like `i` or `a` are valid C++ manglings too
    if !symbol.starts_with("_Z") && !symbol.starts_with("__Z") {
        return symbol.to_string();
    }
    CppSymbol::new(symbol)
        .ok()
        .and_then(|cpp| cpp.demangle(&DemangleOptions::default()).ok())
        .unwrap_or_else(|| symbol.to_string())
}

/// Read `(name, value, size)` of every named symbol in an ELF file
///
/// # Errors
/// Returns an error if the file cannot be read or is not a parseable object.
pub fn read_elf_symbols<P: AsRef<Path>>(path: P) -> Result<Vec<ElfSymbol>, ResourceError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| ResourceError::io(path, e))?;
    let obj = object::File::parse(&*data)
        .map_err(|e| ResourceError::Elf { path: path.to_path_buf(), reason: e.to_string() })?;

    let symbols: Vec<ElfSymbol> = obj
        .symbols()
        .filter_map(|symbol| {
            let name = symbol.name().ok().filter(|name| !name.is_empty())?;
            Some(ElfSymbol { name: name.to_string(), value: symbol.address(), size: symbol.size() })
        })
        .collect();

    if symbols.is_empty() {
        warn!("'{}' has no symbol table, was it stripped?", path.display());
    }
    Ok(symbols)
}

/// Cache file of `binary` in `cache_dir`; slashes in the name become underscores
#[must_use]
pub fn cache_file_name(cache_dir: &Path, binary: &str) -> PathBuf {
    cache_dir.join(format!("{}.symbols", binary.replace('/', "_")))
}

/// Symbol table of one binary, from the cache if present, from the ELF file
/// otherwise
///
/// A table built from ELF is written back to the cache when a cache directory
/// is given.
///
/// # Errors
/// Returns an error if neither source can be read.
pub fn load_symbol_table(
    binary: &str,
    elf_path: &Path,
    cache_dir: Option<&Path>,
) -> Result<SymbolTable, ResourceError> {
    let cache_file = cache_dir.map(|dir| cache_file_name(dir, binary));
    if let Some(cache_file) = cache_file.as_deref().filter(|file| file.is_file()) {
        return SymbolTable::import_from_file(binary, cache_file);
    }

    let table = SymbolTable::from_elf_symbols(binary, read_elf_symbols(elf_path)?);
    if let Some(cache_file) = cache_file {
        table.export_to_file(&cache_file)?;
    }
    Ok(table)
}

/// Symbol tables of every binary in the manifest
///
/// # Errors
/// Fails on the first binary whose symbols cannot be loaded.
pub fn load_symbol_tables(
    manifest: &BinaryManifest,
    cache_dir: Option<&Path>,
) -> Result<SymbolTables, ResourceError> {
    if let Some(dir) = cache_dir {
        fs::create_dir_all(dir).map_err(|e| ResourceError::io(dir, e))?;
    }

    let tables = manifest
        .iter()
        .map(|binary| load_symbol_table(&binary.name, &binary.path, cache_dir))
        .collect::<Result<SymbolTables, _>>()?;

    info!("Loaded symbol tables of {} binaries", tables.len());
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demangle_rust_symbol() {
        let demangled = demangle_symbol("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
        assert_eq!(demangled, "core::ptr::drop_in_place");
    }

    #[test]
    fn test_demangle_cpp_symbol() {
        assert_eq!(demangle_symbol("_Z3fooi"), "foo(int)");
    }

    #[test]
    fn test_demangle_plain_symbol() {
        assert_eq!(demangle_symbol("memcpy"), "memcpy");
        assert_eq!(demangle_symbol("_start"), "_start");
    }

    #[test]
    fn test_short_c_names_are_not_types() {
        for name in ["a", "b", "i", "d", "v"] {
            assert_eq!(demangle_symbol(name), name);
        }
    }

    #[test]
    fn test_cache_file_name() {
        let path = cache_file_name(Path::new("/tmp/cache"), "bin/init");
        assert_eq!(path, PathBuf::from("/tmp/cache/bin_init.symbols"));
    }

    #[test]
    fn test_load_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            cache_file_name(dir.path(), "libfoo"),
            "libfoo\t0000000000001000\t0000000000001040\tfoo\n",
        )
        .unwrap();

        // the ELF path does not exist, so only the cache can satisfy this
        let table = load_symbol_table("libfoo", Path::new("/nonexistent/libfoo.so"), Some(dir.path())).unwrap();
        assert_eq!(table.find_symbol(0x1010).unwrap().label(), "libfoo`foo");
    }

    #[test]
    fn test_load_missing_elf_fails() {
        let err = load_symbol_table("libfoo", Path::new("/nonexistent/libfoo.so"), None).unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }

    #[test]
    fn test_read_non_elf_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not an object file").unwrap();
        let err = read_elf_symbols(file.path()).unwrap_err();
        assert!(matches!(err, ResourceError::Elf { .. }));
    }

    #[test]
    fn test_read_own_symbols() {
        // the test binary itself is an object file with a symbol table
        let exe = std::env::current_exe().unwrap();
        let symbols = read_elf_symbols(&exe).expect("Failed to read symbols");
        assert!(!symbols.is_empty());
        assert!(symbols.iter().all(|s| !s.name.is_empty()));
    }
}
