//! Bootstrap script rendering
//!
//! Renders the user-data script every fresh instance runs once at first
//! boot: install a container runtime and a JSON query tool, fetch the
//! database credentials from the secret store using the instance identity,
//! and launch the application container.
//!
//! Only the secret *identifier* is embedded at render time, never the
//! secret value; instances fetch the current version at boot.

/// Region the rendered script fetches its secret from.
// TODO: derive this from DeploymentConfig.region instead of pinning a
// second copy here.
pub const SECRET_STORE_REGION: &str = "eu-west-1";

/// Render the instance bootstrap script
///
/// `secret_id` is the secret's name or ARN, embedded verbatim. The script
/// is fail-fast: any step's failure aborts it, the instance never becomes
/// healthy, and the autoscaling group replaces it.
pub fn render(secret_id: &str, image: &str, service_port: u16) -> String {
    format!(
        r#"#!/bin/bash
set -euxo pipefail

dnf -y update
dnf -y install docker jq

systemctl start docker
systemctl enable docker

SECRET_JSON="$(aws secretsmanager get-secret-value \
  --region {region} \
  --secret-id '{secret_id}' \
  --query SecretString \
  --output text)"

DB_HOST="$(echo "$SECRET_JSON" | jq -er .DB_HOST)"
DB_USER="$(echo "$SECRET_JSON" | jq -er .DB_USER)"
DB_PASSWORD="$(echo "$SECRET_JSON" | jq -er .DB_PASSWORD)"
DB_NAME="$(echo "$SECRET_JSON" | jq -er .DB_NAME)"

docker run -d \
  --restart always \
  -p {port}:{port} \
  -e DB_HOST="$DB_HOST" \
  -e DB_USER="$DB_USER" \
  -e DB_PASSWORD="$DB_PASSWORD" \
  -e DB_NAME="$DB_NAME" \
  -e APP_DEBUG=true \
  -e APP_DEBUG_HOST_ENABLED=true \
  {image}
"#,
        region = SECRET_STORE_REGION,
        secret_id = secret_id,
        port = service_port,
        image = image,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_fail_fast() {
        let script = render("myapp/database", "registry.example.com/myapp:1.4.2", 80);
        assert!(script.starts_with("#!/bin/bash\nset -euxo pipefail\n"));
    }

    #[test]
    fn script_embeds_only_the_secret_identifier() {
        let script = render("myapp/database", "registry.example.com/myapp:1.4.2", 80);
        assert!(script.contains("--secret-id 'myapp/database'"));
        // No credential material in the script, only the fetch
        assert!(script.contains("get-secret-value"));
        assert!(!script.contains("AWS_ACCESS_KEY"));
    }

    #[test]
    fn script_parses_all_four_fields_strictly() {
        let script = render("myapp/database", "registry.example.com/myapp:1.4.2", 80);
        for field in ["DB_HOST", "DB_USER", "DB_PASSWORD", "DB_NAME"] {
            assert!(
                script.contains(&format!("jq -er .{}", field)),
                "missing strict parse of {}",
                field
            );
        }
    }

    #[test]
    fn container_gets_port_restart_policy_and_debug_flags() {
        let script = render("myapp/database", "registry.example.com/myapp:1.4.2", 8080);
        assert!(script.contains("-p 8080:8080"));
        assert!(script.contains("--restart always"));
        assert!(script.contains("-e APP_DEBUG=true"));
        assert!(script.contains("-e APP_DEBUG_HOST_ENABLED=true"));
        assert!(script.trim_end().ends_with("registry.example.com/myapp:1.4.2"));
    }

    #[test]
    fn exactly_one_container_is_launched() {
        let script = render("myapp/database", "registry.example.com/myapp:1.4.2", 80);
        assert_eq!(script.matches("docker run").count(), 1);
    }
}
