use crate::context::Project;
use colored::Colorize;
use xenflow_config::{ConfigValue, SECRETS_KEY_ENV, Secret, SecretsCipher};

pub fn handle_gen_key() {
    println!("{}", SecretsCipher::generate_key());
    eprintln!(
        "{}",
        format!("Store it in {} and keep it out of version control", SECRETS_KEY_ENV).dimmed()
    );
}

pub fn handle_set(project: &Project, key: &str, value: String, secret: bool) -> anyhow::Result<()> {
    let stored = if secret {
        let cipher = SecretsCipher::from_env()?;
        ConfigValue::Secure {
            secure: cipher.encrypt(&Secret::new(value))?,
        }
    } else {
        ConfigValue::plain(value)
    };

    let mut stack = project.stack.clone();
    stack.set_value(key, stored);
    stack.save(&project.path)?;

    let kind = if secret { "secret" } else { "value" };
    println!("{} {} {} in {}", "✓".green(), kind, key.cyan(), project.path.display());
    Ok(())
}

pub fn handle_get(project: &Project, key: &str) -> anyhow::Result<()> {
    let config = project.plain_config();
    if config.is_secret(key) {
        println!("[secret]");
        return Ok(());
    }
    println!("{}", config.require(key)?);
    Ok(())
}
