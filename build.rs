use std::path::PathBuf;

#[path = "src/types/mod.rs"]
mod types;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/types");
    println!("cargo:rerun-if-env-changed=RELAY_BINDINGS_DIR");

    let Ok(out_dir) = std::env::var("RELAY_BINDINGS_DIR") else {
        return;
    };
    let out_dir = PathBuf::from(out_dir);
    if !out_dir.is_dir() {
        println!(
            "cargo:warning=RELAY_BINDINGS_DIR is not a directory; skipping bindings: {}",
            out_dir.display()
        );
        return;
    }

    let out_file = out_dir.join("relay-bindings.ts");
    let ts_cfg =
        specta::ts::ExportConfiguration::default().bigint(specta::ts::BigIntExportBehavior::Number);
    if let Err(err) = specta::export::ts_with_cfg(&out_file.to_string_lossy(), &ts_cfg) {
        println!(
            "cargo:warning=failed to export Specta bindings to {}: {err}",
            out_file.display()
        );
        std::process::exit(1);
    }
}
