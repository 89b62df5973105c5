//! The `exgen init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create exgen.toml
    if std::path::Path::new("exgen.toml").exists() {
        println!("exgen.toml already exists, skipping.");
    } else {
        std::fs::write("exgen.toml", SAMPLE_CONFIG)?;
        println!("Created exgen.toml");
    }

    // Create example catalog
    std::fs::create_dir_all("catalogs")?;
    let example_path = std::path::Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Add resources and models to catalogs/example.toml");
    println!("  2. Run: exgen validate");
    println!("  3. Run: exgen generate --model 1 --seed 7");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# exgen configuration

catalog = "catalogs"
default_owner = 1
parallelism = 4
max_retries = 3
retry_delay_ms = 500
output_dir = "./exgen-results"
"#;

const EXAMPLE_CATALOG: &str = r#"[[resources]]
id = 1
owner = 1
type = "open-ended-question"
content = "A tank holds $volume litres and drains at $rate litres per minute. How long until it is empty?"

[[resources]]
id = 2
owner = 1
type = "open-ended-question"
content = "How many litres are left in the tank after $minutes minutes?"

[[formulas]]
id = 1
owner = 1
title = "Draining tank"
equation = "volume = rate * minutes"
unknown = "minutes"
variables = [
    { name = "volume", min = 100, max = 500, step = 50 },
    { name = "rate", value = 5 },
]

[[models]]
id = 1
owner = 1
title = "Draining tank"
type = "open-ended-question"

[models.content]
wording = "The tank empties in $minutes minutes."
shuffle_questions_order = false
formula = { formula_id = 1 }

[[models.content.question_blocks]]
number_of_occurrences = 2
resources = [1, 2]
"#;
