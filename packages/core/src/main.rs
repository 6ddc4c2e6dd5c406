// Keystash - encrypted API-key store
//
// This is the main entry point for the command-line tool.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use keystash::cipher::KeyCipher;
use keystash::config::{StoreConfig, ENCRYPTION_KEY_VAR};
use keystash::document::EncryptedDocument;
use keystash::store::{DeleteOutcome, Lookup, SecretsStore, WriteOutcome};
use std::path::{Path, PathBuf};

/// Keystash - encrypted API-key store
#[derive(Parser, Debug)]
#[command(name = "keystash")]
#[command(version)]
#[command(about = "Manage the encrypted API keys used by the model gateway", long_about = None)]
struct Cli {
    /// Path to a keystash.yaml configuration file
    #[arg(short, long, global = true, env = "KEYSTASH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check encryption key and keys file
    Doctor,

    /// List credential names (values are never shown)
    List,

    /// Look up a credential
    Get {
        /// Credential name, e.g. OPENAI_API_KEY
        name: String,

        /// Print the full value instead of a masked preview
        #[arg(long, default_value = "false")]
        reveal: bool,
    },

    /// Store a credential (prompts for the value when omitted)
    Set {
        /// Credential name, e.g. OPENAI_API_KEY
        name: String,

        /// Credential value
        value: Option<String>,
    },

    /// Delete a credential from the keys file
    Delete {
        /// Credential name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },

    /// Generate a fresh ENCRYPTION_KEY
    GenKey,
}

fn load_config(config_path: Option<&Path>) -> Result<StoreConfig> {
    let config = StoreConfig::load(config_path, &keystash::env::SystemEnv)
        .with_context(|| "Failed to load configuration")?;

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    Ok(config)
}

fn mask(value: &str) -> String {
    let preview: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}…", preview)
    }
}

fn run_doctor(config_path: Option<&Path>) -> Result<()> {
    println!("🔍 Keystash Doctor");
    println!("Checking configuration...\n");

    let mut all_checks_passed = true;

    // Check 1: configuration
    print!("1. Loading configuration... ");
    let config = match StoreConfig::load(config_path, &keystash::env::SystemEnv) {
        Ok(config) => {
            println!("✓");
            config
        }
        Err(e) => {
            println!("✗");
            println!("   ❌ {:#}", e);
            return Err(anyhow::anyhow!("Doctor checks failed"));
        }
    };

    // Check 2: encryption key present and usable
    print!("2. Checking ${} ... ", ENCRYPTION_KEY_VAR);
    let cipher = match KeyCipher::from_config(config.encryption_key.as_deref()) {
        Ok(cipher) => {
            println!("✓");
            Some(cipher)
        }
        Err(e) => {
            println!("✗");
            println!("   ❌ {}", e);
            println!("   💡 Generate one with: keystash gen-key");
            all_checks_passed = false;
            None
        }
    };

    // Check 3: keys file readable
    print!("3. Reading keys file {}... ", config.keys_file.display());
    let document = EncryptedDocument::new(&config.keys_file);
    let entries = match document.try_load() {
        Ok(entries) => {
            if config.keys_file.exists() {
                println!("✓ ({} entr{})", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
            } else {
                println!("⊘");
                println!("   ⚠️  Not created yet (first `keystash set` will create it)");
            }
            Some(entries)
        }
        Err(e) => {
            println!("✗");
            println!("   ❌ {}", e);
            all_checks_passed = false;
            None
        }
    };

    // Check 4: every stored value decrypts with the active key
    print!("4. Decrypting stored values... ");
    match (&cipher, &entries) {
        (Some(cipher), Some(entries)) => {
            let failed: Vec<&String> = entries
                .iter()
                .filter(|(_, token)| cipher.decrypt(token).is_err())
                .map(|(name, _)| name)
                .collect();

            if failed.is_empty() {
                println!("✓");
            } else {
                println!("✗");
                for name in failed {
                    println!("   ❌ {} cannot be decrypted with the current key", name);
                }
                all_checks_passed = false;
            }
        }
        _ => {
            println!("⊘");
            println!("   ⚠️  Skipped (key or keys file unavailable)");
        }
    }

    println!();
    if all_checks_passed {
        println!("✅ All checks passed! The key store is ready.");
        Ok(())
    } else {
        println!("❌ Some checks failed. Please fix the issues above.");
        Err(anyhow::anyhow!("Doctor checks failed"))
    }
}

fn run_list(config: &StoreConfig) -> Result<()> {
    let store = SecretsStore::new(config);
    for name in store.list() {
        println!("{}", name);
    }
    Ok(())
}

fn run_get(config: &StoreConfig, name: &str, reveal: bool) -> Result<()> {
    let store = SecretsStore::new(config);

    match store.get(name) {
        Lookup::Found(credential) => {
            if reveal {
                println!("{}", credential.value);
            } else {
                println!("{} = {} (from {})", name, mask(&credential.value), credential.source);
            }
            Ok(())
        }
        Lookup::NotFound => Err(anyhow::anyhow!("Credential '{}' not found", name)),
        Lookup::Failed(e) => Err(anyhow::Error::new(e)
            .context(format!("Credential '{}' could not be read", name))),
    }
}

fn run_set(config: &StoreConfig, name: &str, value: Option<String>) -> Result<()> {
    if !keystash::admin::is_valid_key_name(name) {
        anyhow::bail!("Invalid credential name '{}': use letters, digits and '_'", name);
    }

    let value = match value {
        Some(value) => value,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Value for {}", name))
            .interact()
            .with_context(|| "Failed to read credential value")?,
    };

    let store = SecretsStore::new(config);

    match store.set(name, &value) {
        WriteOutcome::Persisted => {
            println!("✓ Stored {} in {}", name, store.keys_file().display());
            Ok(())
        }
        WriteOutcome::CachedOnly(e) | WriteOutcome::Rejected(e) => {
            Err(anyhow::Error::new(e).context(format!("Failed to store '{}'", name)))
        }
    }
}

fn run_delete(config: &StoreConfig, name: &str, yes: bool) -> Result<()> {
    if !yes {
        let theme = ColorfulTheme::default();
        let confirmed = Confirm::with_theme(&theme)
            .with_prompt(format!("Delete {}?", name))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("❌ Cancelled by user");
            return Ok(());
        }
    }

    let store = SecretsStore::new(config);

    match store.delete(name) {
        DeleteOutcome::Removed => {
            println!("✓ Deleted {}", name);
            Ok(())
        }
        DeleteOutcome::Absent => {
            println!("⊘ {} was not stored", name);
            Ok(())
        }
        DeleteOutcome::Failed(e) => {
            Err(anyhow::Error::new(e).context(format!("Failed to delete '{}'", name)))
        }
    }
}

fn run_gen_key() -> Result<()> {
    println!("{}", KeyCipher::generate_key());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = keystash::logging::init(cli.json_logs) {
        eprintln!("⚠️  {}", e);
    }

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Doctor => run_doctor(config_path),
        Commands::GenKey => run_gen_key(),
        Commands::List => load_config(config_path).and_then(|config| run_list(&config)),
        Commands::Get { name, reveal } => {
            load_config(config_path).and_then(|config| run_get(&config, &name, reveal))
        }
        Commands::Set { name, value } => {
            load_config(config_path).and_then(|config| run_set(&config, &name, value))
        }
        Commands::Delete { name, yes } => {
            load_config(config_path).and_then(|config| run_delete(&config, &name, yes))
        }
    };

    if let Err(e) = result {
        eprintln!("\nError: {:#}", e);
        eprintln!("💡 Run 'keystash doctor' to check your configuration.");
        std::process::exit(1);
    }
}
