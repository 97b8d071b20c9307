//! `photoproof` command-line tool
//!
//! ```text
//! photoproof setup   [--keys DIR]
//! photoproof capture [--keys DIR] [--fill R,G,B] --out FILE
//! photoproof edit    [--keys DIR] --in FILE --out FILE
//! photoproof view    [--keys DIR] --in FILE
//! photoproof inspect --in FILE
//! ```
//!
//! Photographs are JSON interchange files. `setup` writes `pcd.pk`, `pcd.vk`
//! and the device identity `identity.key` into the keys directory
//! (`PHOTOPROOF_KEYS_DIR`, default `./photoproof-keys`).

#![forbid(unsafe_code)]

use std::{env, fs, path::PathBuf};

use anyhow::{anyhow, bail, Context};
use photoproof::{
    config::{self, Config},
    keys,
    photograph::PhotographFile,
    scheduler, Camera, Editor, Identity, Image, Photograph, Transformation, TransformationParameters, Verdict,
    Verifier,
};
use tracing::info;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn required(args: &[String], key: &str) -> anyhow::Result<PathBuf> {
    parse_flag(args, key).map(PathBuf::from).ok_or_else(|| anyhow!("missing {key} <FILE>"))
}

fn parse_rgb(s: &str) -> anyhow::Result<[u8; 3]> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("--fill expects R,G,B, got `{s}`");
    }
    let mut rgb = [0u8; 3];
    for (slot, p) in rgb.iter_mut().zip(&parts) {
        *slot = p.parse().with_context(|| format!("bad channel `{p}` in --fill"))?;
    }
    Ok(rgb)
}

fn usage() -> ! {
    eprintln!(
        "usage: photoproof <setup|capture|edit|view|inspect> [--keys DIR] [--in FILE] [--out FILE] [--fill R,G,B]"
    );
    std::process::exit(2);
}

fn read_photograph(path: &PathBuf, keys: &keys::PcdKeys) -> anyhow::Result<Photograph> {
    let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Photograph::from_json(&json, keys).with_context(|| format!("parse photograph {}", path.display()))
}

fn write_photograph(path: &PathBuf, p: &Photograph) -> anyhow::Result<()> {
    fs::write(path, p.to_json()).with_context(|| format!("write {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(cmd) = args.get(1).cloned() else { usage() };

    let mut cfg = Config::from_env();
    if let Some(dir) = parse_flag(&args, "--keys") {
        cfg.keys_dir = dir.into();
    }
    config::init_tracing(&cfg);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.workers)
        .enable_all()
        .build()
        .context("start runtime")?;

    match cmd.as_str() {
        "setup" => {
            let keys = keys::generate()?;
            keys::save(&cfg.keys_dir, &keys).context("write key files")?;
            let identity = Identity::generate();
            keys::save_identity(cfg.identity_path(), &identity).context("write identity")?;
            keys::install_global(keys)?;
            info!(dir = %cfg.keys_dir.display(), public_key = %identity.public_key(), "setup complete");
            println!("keys written to {}", cfg.keys_dir.display());
            println!("device public key: {}", identity.public_key());
        }
        "capture" => {
            let out = required(&args, "--out")?;
            let keys = keys::install_global(keys::load(&cfg.keys_dir).context("load keys")?)?;
            let identity = keys::load_identity(cfg.identity_path()).context("load identity")?;
            let mut camera = Camera::new(identity, keys);
            let image = match parse_flag(&args, "--fill") {
                Some(fill) => Image::filled(parse_rgb(&fill)?),
                None => Image::random(&mut rand::rngs::OsRng),
            };
            let p = camera.capture(image);
            write_photograph(&out, &p)?;
            println!("captured {} -> {}", p.record.original_hash, out.display());
        }
        "edit" => {
            let input = required(&args, "--in")?;
            let out = required(&args, "--out")?;
            let keys = keys::install_global(keys::load(&cfg.keys_dir).context("load keys")?)?;
            let editor = Editor::new(keys::load_identity(cfg.identity_path()).context("load identity")?);
            let p = read_photograph(&input, &keys)?;
            let next = rt.block_on(editor.edit_async(p, Transformation::Identity, TransformationParameters::Identity))?;
            write_photograph(&out, &next)?;
            println!("edited {} -> {}", input.display(), out.display());
        }
        "view" => {
            let input = required(&args, "--in")?;
            let keys = keys::install_global(keys::load(&cfg.keys_dir).context("load keys")?)?;
            let p = read_photograph(&input, &keys)?;
            let verifier = Verifier::new(keys.verifying.clone());
            match rt.block_on(scheduler::view(verifier, p.clone()))? {
                Verdict::Valid => {
                    println!("valid");
                    print!("{}", p.record.image.render());
                }
                Verdict::Invalid(why) => {
                    println!("invalid: {why}");
                    std::process::exit(1);
                }
            }
        }
        "inspect" => {
            let input = required(&args, "--in")?;
            let json = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
            let file: PhotographFile = serde_json::from_str(&json).context("parse photograph")?;
            println!("public_key:    {}", file.public_key);
            println!("original_hash: {}", file.original_hash);
            println!("pixels:        {}", file.image.len());
            match &file.pcd_proof {
                None => println!("state:         genesis (bare signature)"),
                Some(b64) => println!("state:         chained (proof, {} base64 chars)", b64.len()),
            }
        }
        _ => usage(),
    }
    Ok(())
}
