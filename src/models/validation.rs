use anyhow::{Result, anyhow};

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(anyhow!("Email address cannot be empty"));
    }

    if email.len() > 254 {
        return Err(anyhow!("Email address too long (maximum 254 characters)"));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(anyhow!("Email address must contain '@'"));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(anyhow!("Email address is malformed"));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(anyhow!("Email address contains whitespace"));
    }

    Ok(())
}

pub fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field));
    }

    Ok(())
}
