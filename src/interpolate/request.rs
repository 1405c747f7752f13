//! Interpolation of a whole wire request
//!
//! Order: URL, headers (names and values), body, path parameters, auth
//! fields, proxy fields. JSON bodies are interpolated with string escaping;
//! form and multipart bodies only have their values interpolated; file
//! bodies are left alone.

use serde_json::Value;

use crate::auth;
use crate::errors::{Result, RunnerError};
use crate::request::{WireAuth, WireBody, WirePart, WireRequest};

use super::{interpolate_json, interpolate_str};

/// Resolve every placeholder of the request in place
pub fn interpolate_request(request: &mut WireRequest, scope: &Value) -> Result<()> {
    let s = |text: &str| interpolate_str(text, scope);

    request.url = s(&request.url);

    request.headers = request
        .headers
        .iter()
        .map(|(name, value)| (s(name), s(value)))
        .collect();

    match &mut request.body {
        WireBody::None | WireBody::File(_) => {}
        WireBody::Json(text) => {
            let interpolated = interpolate_json(text, scope);
            if let Err(e) = serde_json::from_str::<Value>(&interpolated) {
                tracing::debug!(error = %e, "JSON body is not valid JSON after interpolation");
            }
            *text = interpolated;
        }
        WireBody::Text(text) => *text = s(text),
        WireBody::Form(pairs) => {
            for (_, value) in pairs.iter_mut() {
                *value = s(value);
            }
        }
        WireBody::Multipart(parts) => {
            for part in parts.iter_mut() {
                if let WirePart::Text { value, .. } = part {
                    *value = s(value);
                }
            }
        }
    }

    let params: Vec<(String, String)> = request
        .path_params
        .iter()
        .map(|(name, value)| (name.clone(), s(value)))
        .collect();
    request.url = with_scheme(&substitute_path_params(&request.url, &params));
    request.path_params = params;

    let parsed = url::Url::parse(&request.url)
        .map_err(|_| RunnerError::InvalidUrl(request.url.clone()))?;
    if request.encode_url {
        request.url = parsed.to_string();
    }

    interpolate_auth(request, scope);

    if let Some(proxy) = &mut request.proxy {
        proxy.protocol = s(&proxy.protocol);
        proxy.hostname = s(&proxy.hostname);
        proxy.port = s(&proxy.port);
        proxy.auth.username = s(&proxy.auth.username);
        proxy.auth.password = s(&proxy.auth.password);
        proxy.bypass_proxy = s(&proxy.bypass_proxy);
    }

    Ok(())
}

fn interpolate_auth(request: &mut WireRequest, scope: &Value) {
    let s = |text: &mut String| *text = interpolate_str(text, scope);

    match &mut request.auth {
        WireAuth::None => {}
        WireAuth::Basic { username, password } => {
            s(username);
            s(password);
            let header = auth::basic_header(username, password);
            request.set_header("Authorization", header);
            request.auth = WireAuth::None;
        }
        WireAuth::Wsse(wsse) => {
            s(&mut wsse.username);
            s(&mut wsse.password);
            let header = auth::wsse_header(&wsse.username, &wsse.password);
            request.set_header("X-WSSE", header);
            request.auth = WireAuth::None;
        }
        WireAuth::Awsv4(aws) => {
            s(&mut aws.access_key_id);
            s(&mut aws.secret_access_key);
            s(&mut aws.session_token);
            s(&mut aws.service);
            s(&mut aws.region);
            s(&mut aws.profile_name);
        }
        WireAuth::Digest(digest) => {
            s(&mut digest.username);
            s(&mut digest.password);
        }
        WireAuth::Ntlm(ntlm) => {
            s(&mut ntlm.username);
            s(&mut ntlm.password);
            s(&mut ntlm.domain);
        }
        WireAuth::Oauth1(oauth1) => {
            s(&mut oauth1.consumer_key);
            s(&mut oauth1.consumer_secret);
            s(&mut oauth1.access_token);
            s(&mut oauth1.access_token_secret);
            s(&mut oauth1.callback_url);
            s(&mut oauth1.verifier);
            s(&mut oauth1.realm);
            s(&mut oauth1.nonce);
            s(&mut oauth1.timestamp);
            s(&mut oauth1.credentials_id);
        }
        WireAuth::Oauth2(oauth2) => {
            s(&mut oauth2.access_token_url);
            s(&mut oauth2.authorization_url);
            s(&mut oauth2.callback_url);
            s(&mut oauth2.client_id);
            s(&mut oauth2.client_secret);
            s(&mut oauth2.username);
            s(&mut oauth2.password);
            s(&mut oauth2.scope);
            s(&mut oauth2.state);
            s(&mut oauth2.credentials_id);
            s(&mut oauth2.token_header_prefix);
            s(&mut oauth2.token_query_key);
        }
    }
}

/// Prefix `http://` when the URL has no scheme
pub fn with_scheme(url: &str) -> String {
    let lower = url.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Replace `:name` path segments (and `:name` tokens inside OData
/// `Entity(...)` segments) with their bound values. The query string,
/// fragment and a trailing slash are kept; unbound names stay untouched.
pub fn substitute_path_params(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let split_at = url.find(['?', '#']).unwrap_or(url.len());
    let (path_part, rest) = url.split_at(split_at);

    let (prefix, path) = match path_part.find("://") {
        Some(scheme_end) => {
            let after = scheme_end + 3;
            match path_part[after..].find('/') {
                Some(slash) => path_part.split_at(after + slash),
                None => (path_part, ""),
            }
        }
        None => match path_part.find('/') {
            Some(slash) => path_part.split_at(slash),
            None => (path_part, ""),
        },
    };

    let lookup = |name: &str| params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str());

    let substituted: Vec<String> = path
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                return lookup(name).map(str::to_string).unwrap_or_else(|| segment.to_string());
            }
            if segment.contains('(') && segment.ends_with(')') {
                return substitute_odata(segment, &lookup);
            }
            segment.to_string()
        })
        .collect();

    format!("{}{}{}", prefix, substituted.join("/"), rest)
}

fn substitute_odata<'a>(segment: &str, lookup: &impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != ':' {
            out.push(c);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, next)) = chars.peek() {
            if next.is_alphanumeric() || next == '_' || next == '-' {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let name = &segment[start..end];
        match lookup(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => {
                out.push(':');
                out.push_str(name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{DigestAuth, ProxyConfig};
    use indexmap::IndexMap;
    use serde_json::json;

    fn request(url: &str) -> WireRequest {
        WireRequest {
            method: "GET".into(),
            url: url.into(),
            headers: IndexMap::new(),
            body: WireBody::None,
            auth: WireAuth::None,
            path_params: vec![],
            timeout_ms: None,
            proxy: None,
            encode_url: false,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_path_params_keep_query() {
        assert_eq!(
            substitute_path_params("https://api.test/users/:id?x=1", &params(&[("id", "42")])),
            "https://api.test/users/42?x=1"
        );
    }

    #[test]
    fn test_path_params_unbound_and_trailing_slash() {
        assert_eq!(
            substitute_path_params("https://api.test/:org/:repo/", &params(&[("org", "acme")])),
            "https://api.test/acme/:repo/"
        );
    }

    #[test]
    fn test_odata_segments() {
        assert_eq!(
            substitute_path_params(
                "https://svc.test/odata/Products(:id)/Items(Key=:key,Other=1)",
                &params(&[("id", "7"), ("key", "'k'")])
            ),
            "https://svc.test/odata/Products(7)/Items(Key='k',Other=1)"
        );
    }

    #[test]
    fn test_host_port_not_treated_as_param() {
        assert_eq!(
            substitute_path_params("localhost:8080/items/:id", &params(&[("id", "1"), ("8080", "x")])),
            "localhost:8080/items/1"
        );
    }

    #[test]
    fn test_scheme_added() {
        assert_eq!(with_scheme("api.test/x"), "http://api.test/x");
        assert_eq!(with_scheme("HTTPS://api.test"), "HTTPS://api.test");
    }

    #[test]
    fn test_full_request_interpolation() {
        let scope = json!({"host": "api.test", "id": "42", "name": "a \"quoted\" name", "hdr": "X-Trace"});
        let mut req = request("{{host}}/users/:id?x=1");
        req.path_params = vec![("id".into(), "{{id}}".into())];
        req.headers.insert("{{hdr}}".into(), "{{id}}".into());
        req.body = WireBody::Json("{\"name\": \"{{name}}\"}".into());

        interpolate_request(&mut req, &scope).unwrap();

        assert_eq!(req.url, "http://api.test/users/42?x=1");
        assert_eq!(req.header("X-Trace"), Some("42"));
        let WireBody::Json(body) = &req.body else { panic!() };
        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["name"], "a \"quoted\" name");
    }

    #[test]
    fn test_form_values_only() {
        let scope = json!({"k": "key", "v": "value"});
        let mut req = request("http://x.test");
        req.body = WireBody::Form(vec![("{{k}}".into(), "{{v}}".into())]);
        interpolate_request(&mut req, &scope).unwrap();
        let WireBody::Form(pairs) = &req.body else { panic!() };
        assert_eq!(pairs[0], ("{{k}}".to_string(), "value".to_string()));
    }

    #[test]
    fn test_basic_auth_becomes_header() {
        let scope = json!({"user": "alice"});
        let mut req = request("http://x.test");
        req.auth = WireAuth::Basic {
            username: "{{user}}".into(),
            password: "pw".into(),
        };
        interpolate_request(&mut req, &scope).unwrap();
        assert_eq!(req.header("authorization"), Some(auth::basic_header("alice", "pw").as_str()));
        assert!(matches!(req.auth, WireAuth::None));
    }

    #[test]
    fn test_oauth1_fields_interpolated() {
        let scope = json!({"key": "ck", "secret": "cs", "token": "at"});
        let mut req = request("http://x.test");
        req.auth = WireAuth::Oauth1(crate::collection::OAuth1Auth {
            consumer_key: "{{key}}".into(),
            consumer_secret: "{{secret}}".into(),
            access_token: "{{token}}".into(),
            ..Default::default()
        });
        interpolate_request(&mut req, &scope).unwrap();
        let WireAuth::Oauth1(oauth1) = &req.auth else {
            panic!("oauth1 block expected");
        };
        assert_eq!(oauth1.consumer_key, "ck");
        assert_eq!(oauth1.consumer_secret, "cs");
        assert_eq!(oauth1.access_token, "at");
    }

    #[test]
    fn test_auth_and_proxy_fields() {
        let scope = json!({"pw": "secret", "proxyHost": "proxy.local"});
        let mut req = request("http://x.test");
        req.auth = WireAuth::Digest(DigestAuth {
            username: "u".into(),
            password: "{{pw}}".into(),
        });
        req.proxy = Some(ProxyConfig {
            enabled: true,
            hostname: "{{proxyHost}}".into(),
            ..Default::default()
        });
        interpolate_request(&mut req, &scope).unwrap();
        assert!(matches!(&req.auth, WireAuth::Digest(d) if d.password == "secret"));
        assert_eq!(req.proxy.unwrap().hostname, "proxy.local");
    }

    #[test]
    fn test_invalid_url() {
        let mut req = request("http://exa mple.test/");
        let err = interpolate_request(&mut req, &json!({})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid URL format"));
    }
}
