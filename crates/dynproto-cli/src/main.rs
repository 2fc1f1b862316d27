//! dynproto - Inspect and re-encode Protocol Buffer messages at run time
//!
//! This tool loads compiled descriptor sets (`protoc --descriptor_set_out`)
//! and uses them to describe message types, decode messages into a readable
//! dump, and re-serialize messages one at a time or as a framed stream.

mod loader;
mod outline;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dynproto_core::{
    DecodeConfig, DescriptorPool, DynamicMessage, FrameReader, FrameWriter, MessageDescriptor,
};
use loader::{ConflictStrategy, DescriptorSetLoader};
use outline::OutlineWriter;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Inspect and re-encode Protocol Buffer messages using runtime descriptor sets
#[derive(Parser, Debug)]
#[command(name = "dynproto")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Conflict resolution strategy for same-name different-content files
    #[arg(long, value_enum, default_value = "error")]
    conflict_strategy: ConflictStrategy,

    /// Maximum nesting of messages and groups while decoding
    #[arg(long, env = "DYNPROTO_RECURSION_LIMIT", default_value_t = DecodeConfig::DEFAULT_RECURSION_LIMIT)]
    recursion_limit: u32,

    /// Accept messages with unset proto2 required fields
    #[arg(long, global = true)]
    allow_partial: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Serialized FileDescriptorSet to load (may be repeated)
    #[arg(short = 's', long = "descriptor-set", value_name = "FILE")]
    descriptor_sets: Vec<PathBuf>,

    /// Directory searched recursively for .pb, .desc and .binpb descriptor sets
    #[arg(short = 'd', long, value_name = "DIR")]
    descriptor_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered file and the types it declares
    List,

    /// Print an outline of one message type
    Describe {
        /// Fully-qualified message type name
        type_name: String,
    },

    /// Parse one message and print its fields
    Decode {
        /// Fully-qualified message type name
        type_name: String,

        /// Read the message from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Parse one message and serialize it again
    Reencode {
        /// Fully-qualified message type name
        type_name: String,

        /// Read the message from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail unless the output is byte-identical to the input
        #[arg(long)]
        check: bool,
    },

    /// Re-serialize length-prefixed messages from stdin to stdout until EOF
    Pipe {
        /// Fully-qualified message type name
        type_name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let pool = load_pool(&cli)?;
    let config = DecodeConfig::new()
        .recursion_limit(cli.recursion_limit)
        .allow_partial(cli.allow_partial);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Command::List => list(&pool, &mut stdout),
        Command::Describe { type_name } => describe(&pool, type_name, &mut stdout),
        Command::Decode { type_name, input } => {
            let bytes = read_input(input.as_deref())?;
            decode(&pool, type_name, &bytes, &config, &mut stdout)
        }
        Command::Reencode {
            type_name,
            input,
            output,
            check,
        } => {
            let bytes = read_input(input.as_deref())?;
            let encoded = reencode(&pool, type_name, &bytes, &config, *check)?;
            match output {
                Some(path) => fs::write(path, &encoded)
                    .with_context(|| format!("Failed to write file: {}", path.display())),
                None => stdout
                    .write_all(&encoded)
                    .and_then(|()| stdout.flush())
                    .context("Failed to write to stdout"),
            }
        }
        Command::Pipe { type_name } => {
            let frames = pipe(&pool, type_name, &config, io::stdin().lock(), stdout)?;
            info!("Re-encoded {} frame(s)", frames);
            Ok(())
        }
    }
}

/// Loads every descriptor set named on the command line into one pool
fn load_pool(cli: &Cli) -> Result<DescriptorPool> {
    let mut loader = DescriptorSetLoader::new(cli.conflict_strategy);
    match &cli.input.descriptor_dir {
        Some(dir) => loader.load_dir(dir)?,
        None => {
            for path in &cli.input.descriptor_sets {
                loader.load_file(path)?;
            }
        }
    }
    loader.into_pool()
}

/// Reads the whole input file, or stdin when no file is given
fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read stdin")?;
            Ok(bytes)
        }
    }
}

fn message_type(pool: &DescriptorPool, type_name: &str) -> Result<MessageDescriptor> {
    let name = type_name.strip_prefix('.').unwrap_or(type_name);
    pool.get_message_by_name(name)
        .ok_or_else(|| anyhow!("Unknown message type: {}", name))
}

fn list(pool: &DescriptorPool, out: &mut impl Write) -> Result<()> {
    for file in pool.files() {
        writeln!(out, "{} ({})", file.name(), file.syntax().as_str())?;
        for message in file.messages() {
            writeln!(out, "  message {}", message.full_name())?;
        }
        for enum_type in file.enums() {
            writeln!(out, "  enum {}", enum_type.full_name())?;
        }
        for service in file.services() {
            writeln!(out, "  service {}", service.full_name())?;
        }
        for extension in file.extensions() {
            writeln!(out, "  extension {}", extension.full_name())?;
        }
    }
    Ok(())
}

fn describe(pool: &DescriptorPool, type_name: &str, out: &mut impl Write) -> Result<()> {
    let desc = message_type(pool, type_name)?;
    let mut text = String::new();
    OutlineWriter::new(&mut text).write_message_type(&desc)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

fn decode(
    pool: &DescriptorPool,
    type_name: &str,
    bytes: &[u8],
    config: &DecodeConfig,
    out: &mut impl Write,
) -> Result<()> {
    let desc = message_type(pool, type_name)?;
    let message = DynamicMessage::decode_with_config(desc, bytes, config)
        .with_context(|| format!("Failed to parse {} ({} bytes)", type_name, bytes.len()))?;
    debug!(
        "Parsed {} with {} unknown field(s)",
        type_name,
        message.unknown_fields().len()
    );

    let mut text = String::new();
    OutlineWriter::new(&mut text).write_message(&message)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

fn reencode(
    pool: &DescriptorPool,
    type_name: &str,
    bytes: &[u8],
    config: &DecodeConfig,
    check: bool,
) -> Result<Vec<u8>> {
    let desc = message_type(pool, type_name)?;
    let message = DynamicMessage::decode_with_config(desc, bytes, config)
        .with_context(|| format!("Failed to parse {} ({} bytes)", type_name, bytes.len()))?;
    let encoded = message.encode_to_vec();

    if check && encoded != bytes {
        bail!(
            "Re-encoded output differs from input ({} bytes in, {} bytes out)",
            bytes.len(),
            encoded.len()
        );
    }
    Ok(encoded)
}

/// Re-encodes every frame of `input` into `output`, returning the frame count
fn pipe(
    pool: &DescriptorPool,
    type_name: &str,
    config: &DecodeConfig,
    input: impl Read,
    output: impl Write,
) -> Result<usize> {
    let desc = message_type(pool, type_name)?;
    let mut reader = FrameReader::new(input);
    let mut writer = FrameWriter::new(output);
    let mut frames = 0;

    while let Some(frame) = reader.read_frame().context("Failed to read frame")? {
        let message = DynamicMessage::decode_with_config(desc.clone(), frame.as_slice(), config)
            .with_context(|| format!("Failed to parse frame {}", frames + 1))?;
        writer
            .write_frame(&message.encode_to_vec())
            .context("Failed to write frame")?;
        frames += 1;
    }

    debug!("Input closed after {} frame(s)", frames);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet,
    };
    use std::io::Cursor;
    use tempfile::TempDir;

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            r#type: Some(ty as i32),
            label: Some(label as i32),
            ..Default::default()
        }
    }

    fn descriptor_set() -> FileDescriptorSet {
        let mut color = field("color", 3, Type::Enum, Label::Optional);
        color.type_name = Some(".demo.Color".into());
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("demo.proto".into()),
                package: Some("demo".into()),
                syntax: Some("proto3".into()),
                message_type: vec![DescriptorProto {
                    name: Some("Point".into()),
                    field: vec![
                        field("label", 1, Type::String, Label::Optional),
                        field("coords", 2, Type::Sint32, Label::Repeated),
                        color,
                    ],
                    ..Default::default()
                }],
                enum_type: vec![EnumDescriptorProto {
                    name: Some("Color".into()),
                    value: vec![
                        EnumValueDescriptorProto {
                            name: Some("RED".into()),
                            number: Some(0),
                            ..Default::default()
                        },
                        EnumValueDescriptorProto {
                            name: Some("BLUE".into()),
                            number: Some(1),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    /// Writes the demo descriptor set into a temp dir and loads it back
    fn pool() -> (TempDir, DescriptorPool) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("demo.binpb");
        fs::write(&path, descriptor_set().encode_to_vec()).unwrap();

        let mut loader = DescriptorSetLoader::new(ConflictStrategy::Error);
        loader.load_file(&path).unwrap();
        (temp_dir, loader.into_pool().unwrap())
    }

    // label: "a", coords: [1, -1], color: BLUE, field 9: varint 7
    const POINT: [u8; 11] = [0x0A, 0x01, b'a', 0x12, 0x02, 0x02, 0x01, 0x18, 0x01, 0x48, 0x07];

    #[test]
    fn test_list() {
        let (_dir, pool) = pool();
        let mut out = Vec::new();
        list(&pool, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("demo.proto (proto3)"));
        assert!(text.contains("message demo.Point"));
        assert!(text.contains("enum demo.Color"));
    }

    #[test]
    fn test_describe() {
        let (_dir, pool) = pool();
        let mut out = Vec::new();
        describe(&pool, ".demo.Point", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("message demo.Point {"));
        assert!(text.contains("  string label = 1;"));
        assert!(text.contains("  repeated sint32 coords = 2 [packed];"));
        assert!(text.contains("  demo.Color color = 3;"));

        assert!(describe(&pool, "demo.Missing", &mut Vec::new()).is_err());
    }

    #[test]
    fn test_decode_dump() {
        let (_dir, pool) = pool();
        let mut out = Vec::new();
        decode(&pool, "demo.Point", &POINT, &DecodeConfig::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("label: \"a\""));
        assert!(text.contains("coords: 1\n"));
        assert!(text.contains("coords: -1\n"));
        assert!(text.contains("color: BLUE (1)"));
        assert!(text.contains("9: <unknown Varint> 07"));
    }

    #[test]
    fn test_reencode_check() {
        let (_dir, pool) = pool();
        let config = DecodeConfig::default();
        let encoded = reencode(&pool, "demo.Point", &POINT, &config, true).unwrap();
        assert_eq!(encoded, POINT);

        // Unpacked coords re-encode packed, so the check fails.
        let unpacked = [0x10, 0x02, 0x10, 0x01];
        assert!(reencode(&pool, "demo.Point", &unpacked, &config, false).is_ok());
        assert!(reencode(&pool, "demo.Point", &unpacked, &config, true).is_err());
    }

    #[test]
    fn test_pipe() {
        let (_dir, pool) = pool();
        let mut input = Vec::new();
        let mut writer = FrameWriter::new(&mut input);
        writer.write_frame(&POINT).unwrap();
        writer.write_frame(&[]).unwrap();

        let mut output = Vec::new();
        let frames = pipe(
            &pool,
            "demo.Point",
            &DecodeConfig::default(),
            Cursor::new(input.clone()),
            &mut output,
        )
        .unwrap();
        assert_eq!(frames, 2);
        assert_eq!(output, input);
    }

    #[test]
    fn test_pipe_rejects_truncated_frame() {
        let (_dir, pool) = pool();
        let input = vec![0x05, 0x00, 0x00, 0x00, 0x0A];
        let result = pipe(
            &pool,
            "demo.Point",
            &DecodeConfig::default(),
            Cursor::new(input),
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_input_mode_required_and_exclusive() {
        assert!(Cli::try_parse_from(["dynproto", "list"]).is_err());
        assert!(Cli::try_parse_from(["dynproto", "-s", "a.pb", "-d", "dir", "list"]).is_err());

        let cli = Cli::try_parse_from(["dynproto", "-s", "a.pb", "-s", "b.pb", "list"]).unwrap();
        assert_eq!(cli.input.descriptor_sets.len(), 2);
        assert!(cli.input.descriptor_dir.is_none());
        assert!(!cli.allow_partial);
    }

    #[test]
    fn test_load_pool_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("demo.desc"),
            descriptor_set().encode_to_vec(),
        )
        .unwrap();
        let dir = temp_dir.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["dynproto", "-d", dir, "--allow-partial", "list"]).unwrap();
        assert!(cli.allow_partial);
        let pool = load_pool(&cli).unwrap();
        assert!(pool.get_message_by_name("demo.Point").is_some());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
