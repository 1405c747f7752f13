//! Hashing, HMAC and random helpers, available through `require('crypto')`

use base64::Engine;
use hmac::{Hmac, Mac};
use md5_digest::Md5;
use rand::Rng;
use rquickjs::{Ctx, Function, Object};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::errors::Result;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

pub fn register(ctx: &Ctx<'_>) -> Result<()> {
    let crypto = Object::new(ctx.clone())?;

    crypto.set("sha256_hex", Function::new(ctx.clone(), sha256_hex)?)?;
    crypto.set("sha512_hex", Function::new(ctx.clone(), sha512_hex)?)?;
    crypto.set("sha1_hex", Function::new(ctx.clone(), sha1_hex)?)?;
    crypto.set("md5_hex", Function::new(ctx.clone(), md5_hex)?)?;

    crypto.set("hmac_sha256", Function::new(ctx.clone(), hmac_sha256)?)?;
    crypto.set("hmac_sha512", Function::new(ctx.clone(), hmac_sha512)?)?;
    crypto.set("hmac_sha256_base64", Function::new(ctx.clone(), hmac_sha256_base64)?)?;

    crypto.set("random_hex", Function::new(ctx.clone(), random_hex)?)?;
    crypto.set("random_int", Function::new(ctx.clone(), random_int)?)?;
    crypto.set("uuid_v4", Function::new(ctx.clone(), uuid_v4)?)?;

    ctx.globals().set("__crypto", crypto)?;
    Ok(())
}

fn sha256_hex(input: String) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn sha512_hex(input: String) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

fn sha1_hex(input: String) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

fn md5_hex(input: String) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn hmac_sha256(key: String, message: String) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn hmac_sha512(key: String, message: String) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn hmac_sha256_base64(key: String, message: String) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn random_hex(length: u32) -> String {
    let length = length as usize;
    let bytes: Vec<u8> = (0..length.div_ceil(2)).map(|_| rand::random::<u8>()).collect();
    let mut text = hex::encode(bytes);
    text.truncate(length);
    text
}

fn random_int(min: i32, max: i32) -> i32 {
    if min >= max {
        return min;
    }
    rand::rng().random_range(min..=max)
}

fn uuid_v4() -> String {
    Uuid::new_v4().to_string()
}
