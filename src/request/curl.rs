//! Curl command generation
//!
//! Renders a wire request as an equivalent curl command for sharing and
//! debugging. Nothing is sent.

use super::{WireAuth, WireBody, WirePart, WireRequest};

/// Generate an equivalent curl command
pub fn to_curl(request: &WireRequest) -> String {
    let mut parts: Vec<String> = vec!["curl".to_string()];

    if request.method != "GET" {
        parts.push("-X".to_string());
        parts.push(request.method.clone());
    }

    let multipart = matches!(request.body, WireBody::Multipart(_));
    for (name, value) in &request.headers {
        // curl picks its own multipart boundary
        if multipart && name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        parts.push("-H".to_string());
        parts.push(shell_escape(&format!("{}: {}", name, value)));
    }

    match &request.auth {
        WireAuth::Basic { username, password } => {
            parts.push("-u".to_string());
            parts.push(shell_escape(&format!("{}:{}", username, password)));
        }
        WireAuth::Digest(digest) => {
            parts.push("--digest".to_string());
            parts.push("-u".to_string());
            parts.push(shell_escape(&format!("{}:{}", digest.username, digest.password)));
        }
        WireAuth::Ntlm(ntlm) => {
            parts.push("--ntlm".to_string());
            parts.push("-u".to_string());
            parts.push(shell_escape(&format!("{}:{}", ntlm.username, ntlm.password)));
        }
        WireAuth::Awsv4(aws) => {
            parts.push("--aws-sigv4".to_string());
            parts.push(shell_escape(&format!("aws:amz:{}:{}", aws.region, aws.service)));
            parts.push("-u".to_string());
            parts.push(shell_escape(&format!(
                "{}:{}",
                aws.access_key_id, aws.secret_access_key
            )));
        }
        WireAuth::None | WireAuth::Wsse(_) | WireAuth::Oauth1(_) | WireAuth::Oauth2(_) => {}
    }

    match &request.body {
        WireBody::None => {}
        WireBody::Json(text) | WireBody::Text(text) => {
            parts.push("--data-raw".to_string());
            parts.push(shell_escape(text));
        }
        WireBody::Form(pairs) => {
            for (name, value) in pairs {
                parts.push("--data-urlencode".to_string());
                parts.push(shell_escape(&format!("{}={}", name, value)));
            }
        }
        WireBody::Multipart(form_parts) => {
            for part in form_parts {
                let field = match part {
                    WirePart::Text { name, value } => format!("{}={}", name, value),
                    WirePart::File {
                        name,
                        path,
                        content_type,
                    } => match content_type {
                        Some(ct) => format!("{}=@{};type={}", name, path.display(), ct),
                        None => format!("{}=@{}", name, path.display()),
                    },
                };
                parts.push("-F".to_string());
                parts.push(shell_escape(&field));
            }
        }
        WireBody::File(file) => {
            parts.push("--data-binary".to_string());
            parts.push(shell_escape(&format!("@{}", file.path.display())));
        }
    }

    if let Some(timeout_ms) = request.timeout_ms {
        parts.push("--max-time".to_string());
        parts.push(format!("{}", timeout_ms as f64 / 1000.0));
    }

    if let Some(proxy) = &request.proxy {
        parts.push("-x".to_string());
        parts.push(shell_escape(&format!(
            "{}://{}:{}",
            proxy.protocol, proxy.hostname, proxy.port
        )));
    }

    parts.push(shell_escape(&request.url));
    parts.join(" ")
}

/// Shell-escape a string for safe inclusion in a command
fn shell_escape(s: &str) -> String {
    let needs_escaping = s.chars().any(|c| {
        matches!(
            c,
            ' ' | '\'' | '"' | '\\' | '$' | '`' | '!' | '*' | '?' | '[' | ']' | '{' | '}' | '('
                | ')' | '<' | '>' | '|' | '&' | ';' | '\n' | '\t'
        )
    });

    if !needs_escaping && !s.is_empty() {
        return s.to_string();
    }

    format!("'{}'", s.replace('\'', "'\"'\"'"))
}
