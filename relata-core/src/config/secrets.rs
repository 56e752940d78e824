use super::ConfigError;

/// Resolves the reference inside a `${...}` placeholder.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

/// Resolves `${NAME}` and `${env:NAME}` from the process environment and
/// `${file:/path}` from the (trimmed) file contents.
pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        let reference = reference.trim();
        match reference.split_once(':') {
            Some(("file", path)) => {
                let path = path.trim();
                std::fs::read_to_string(path)
                    .map(|s| s.trim().to_string())
                    .map_err(|e| ConfigError::Load(format!("secret file '{path}': {e}")))
            }
            Some(("env", var)) => std::env::var(var.trim())
                .map_err(|_| ConfigError::NotFound(format!("env:{}", var.trim()))),
            _ => std::env::var(reference).map_err(|_| ConfigError::NotFound(reference.to_string())),
        }
    }
}

/// Substitute every `${...}` placeholder in `value`.
///
/// Resolved text is not rescanned, so a secret containing `${` is kept as is.
pub fn resolve_placeholders(
    value: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("unclosed placeholder in '{value}'")))?;
        out.push_str(&resolver.resolve(&tail[..end])?);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
