//! The `traitscale init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("traitscale.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("instruments")?;
    write_if_absent(Path::new("instruments/example.toml"), EXAMPLE_INSTRUMENT)?;

    std::fs::create_dir_all("responses")?;
    write_if_absent(Path::new("responses/example.json"), EXAMPLE_RESPONSES)?;

    println!("\nNext steps:");
    println!("  1. Edit instruments/example.toml or add your own instruments");
    println!("  2. Run: traitscale validate");
    println!("  3. Run: traitscale evaluate --responses responses/example.json");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# traitscale configuration

reference_dir = "./instruments"
output_dir = "./traitscale-profiles"
# Fallback norm stratum for instruments that declare none.
# default_stratum = "general"
parallelism = 4

[highlights]
strength_percentile = 75
development_percentile = 25
limit = 3
"#;

const EXAMPLE_INSTRUMENT: &str = r#"[instrument]
id = "example"
version = "1.0.0"
name = "Example Extraversion Scale"
default_stratum = "general"

[[dimensions]]
id = "extraversion"
name = "Extraversion"
raw_min = 2
raw_max = 10
bands = [
    { threshold = 0, label = "low" },
    { threshold = 45, label = "average" },
    { threshold = 55, label = "high" },
]

[[items]]
id = "E1"
text = "I am the life of the party."
dimension = "extraversion"
scale = [1, 5]

[[items]]
id = "E2"
text = "I keep in the background."
dimension = "extraversion"
scale = [1, 5]
reverse = true

[[norm_tables]]
dimension = "extraversion"
stratum = "general"
anchors = [[2, 1, 30], [6, 10, 40], [10, 50, 50], [14, 90, 60]]
"#;

const EXAMPLE_RESPONSES: &str = r#"{
  "respondent": "example-respondent",
  "instrument": { "id": "example", "version": "1.0.0" },
  "stratum": "general",
  "answers": { "E1": 4, "E2": 2 }
}
"#;
