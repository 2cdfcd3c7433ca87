//! Contracts with the variable and cookie providers owned by the host.

use crate::models::Environment;

/// Text substitution for `{{variable}}` placeholders.
///
/// Must be total and side-effect free. An absent resolver behaves like
/// [`NoopResolver`].
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, text: &str) -> String;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, text: &str) -> String {
        self(text)
    }
}

impl VariableResolver for Environment {
    fn resolve(&self, text: &str) -> String {
        self.substitute(text)
    }
}

/// Identity resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl VariableResolver for NoopResolver {
    fn resolve(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Supplies a `Cookie` header value for a host, or an empty string.
pub trait CookieProvider: Send + Sync {
    fn cookie_header(&self, domain: &str) -> String;
}

impl<F> CookieProvider for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn cookie_header(&self, domain: &str) -> String {
        self(domain)
    }
}

/// Resolve through an optional resolver, falling back to identity.
pub(crate) fn resolve_with(resolver: Option<&dyn VariableResolver>, text: &str) -> String {
    match resolver {
        Some(resolver) => resolver.resolve(text),
        None => text.to_string(),
    }
}
