//! Synthetic boilerplate the overlay rewriter injects alongside user code:
//! endpoint registration glue and service init wiring (SPEC_FULL.md
//! supplement; the distilled spec only describes overlay edits in the
//! abstract, not their concrete bodies).

/// Renders the registration call the overlay inserts at the end of a file
/// declaring an endpoint, wiring the handler function into the generated
/// router (spec.md §4.13, §6 wire directives).
#[must_use]
pub fn endpoint_registration(service: &str, endpoint: &str, methods: &[&str], path: &str) -> String {
    format!(
        "\n__encoregen.RegisterEndpoint(\"{service}\", \"{endpoint}\", []string{{{}}}, \"{path}\", {endpoint})\n",
        methods
            .iter()
            .map(|m| format!("\"{m}\""))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Renders the import line the overlay prepends when a file gains a
/// reference to the generated registration package.
#[must_use]
pub fn registration_import() -> &'static str {
    "\nimport __encoregen \"encore.dev/appruntime/shared/reqtrack\"\n"
}

/// Renders the cron job registration call injected near a cron-tagged
/// function's declaration.
#[must_use]
pub fn cron_registration(name: &str, schedule_literal: &str, endpoint: &str) -> String {
    format!("\n__encoregen.RegisterCronJob(\"{name}\", \"{schedule_literal}\", {endpoint})\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_registration_includes_methods_and_path() {
        let s = endpoint_registration("billing", "GetInvoice", &["GET"], "/invoices/:id");
        assert!(s.contains("\"billing\""));
        assert!(s.contains("\"GET\""));
        assert!(s.contains("/invoices/:id"));
    }

    #[test]
    fn cron_registration_embeds_name_and_schedule() {
        let s = cron_registration("daily-report", "every 60m", "RunReport");
        assert!(s.contains("daily-report"));
        assert!(s.contains("every 60m"));
        assert!(s.contains("RunReport"));
    }
}
