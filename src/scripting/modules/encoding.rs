//! Base64, hex and URL encoding

use base64::Engine;
use rquickjs::{Ctx, Function, Object};

use crate::errors::Result;

pub fn register(ctx: &Ctx<'_>) -> Result<()> {
    let encoding = Object::new(ctx.clone())?;

    encoding.set("base64_encode", Function::new(ctx.clone(), base64_encode)?)?;
    encoding.set("base64_decode", Function::new(ctx.clone(), base64_decode)?)?;
    encoding.set("hex_encode", Function::new(ctx.clone(), hex_encode)?)?;
    encoding.set("hex_decode", Function::new(ctx.clone(), hex_decode)?)?;
    encoding.set("url_encode", Function::new(ctx.clone(), url_encode)?)?;
    encoding.set("url_decode", Function::new(ctx.clone(), url_decode)?)?;

    ctx.globals().set("__encoding", encoding)?;
    Ok(())
}

fn base64_encode(input: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(input.as_bytes())
}

fn base64_decode(input: String) -> Option<String> {
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

fn hex_encode(input: String) -> String {
    hex::encode(input.as_bytes())
}

fn hex_decode(input: String) -> Option<String> {
    hex::decode(input.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

fn url_encode(input: String) -> String {
    urlencoding::encode(&input).into_owned()
}

fn url_decode(input: String) -> Option<String> {
    urlencoding::decode(&input).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode("user:pass".into()), "dXNlcjpwYXNz");
        assert_eq!(base64_decode("dXNlcjpwYXNz".into()).as_deref(), Some("user:pass"));
        assert_eq!(base64_decode("%%%".into()), None);
    }

    #[test]
    fn test_hex_and_url() {
        assert_eq!(hex_encode("hi".into()), "6869");
        assert_eq!(hex_decode("6869".into()).as_deref(), Some("hi"));
        assert_eq!(url_encode("a b&c".into()), "a%20b%26c");
        assert_eq!(url_decode("a%20b".into()).as_deref(), Some("a b"));
    }
}
