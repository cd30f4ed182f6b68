use std::{env, path::Path};

use oapi_client_generator::{Generator, GeneratorSettings};

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=petstore.yaml");

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("petstore.rs");
    let yaml_data = include_str!("./petstore.yaml");

    let generation = Generator::new(GeneratorSettings::new()).generate(yaml_data)?;
    for skipped in &generation.diagnostics {
        println!("cargo:warning={}", skipped);
    }
    std::fs::write(&dest_path, generation.to_source()?)?;
    Ok(())
}
