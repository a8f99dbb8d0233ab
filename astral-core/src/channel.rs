//! Bidirectional object channels with a selectable format per direction.

use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::json::{JsonEnvelope, open_envelope};
use crate::object::Object;
use crate::stream::{ObjectReader, ObjectWriter, read_frame, write_frame};
use crate::wire::Width;

/// Frame width used by the binary channel format.
const BINARY_FRAME_WIDTH: Width = Width::W16;

/// How objects are laid out on one direction of a [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// 16-bit length-framed `string8(type) || payload`.
    #[default]
    Binary,
    /// One `{"type": ..., "object": ...}` envelope per line.
    Json,
    /// One text rendering per line.
    Text,
    /// One `#[type] text` line per object.
    #[serde(rename = "text+")]
    TextTyped,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Binary => "binary",
            Format::Json => "json",
            Format::Text => "text",
            Format::TextTyped => "text+",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "binary" => Ok(Format::Binary),
            "json" => Ok(Format::Json),
            "text" => Ok(Format::Text),
            "text+" => Ok(Format::TextTyped),
            other => Err(Error::Unsupported(format!("unknown channel format {other:?}"))),
        }
    }
}

/// Input and output formats of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub input: Format,
    pub output: Format,
}

impl ChannelConfig {
    pub fn new(input: Format, output: Format) -> Self {
        Self { input, output }
    }

    /// The same format in both directions.
    pub fn symmetric(format: Format) -> Self {
        Self::new(format, format)
    }
}

/// Parses `"in,out"`, or a single format for both directions.
impl FromStr for ChannelConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(',') {
            Some((input, output)) => Ok(Self::new(input.parse()?, output.parse()?)),
            None => s.parse().map(Self::symmetric),
        }
    }
}

/// A bidirectional object channel over a transport that is both readable and writable.
pub struct Channel<T> {
    io: BufReader<T>,
    config: ChannelConfig,
    blueprints: Arc<Blueprints>,
}

impl<T: Read + Write> Channel<T> {
    /// A binary channel.
    pub fn new(transport: T, blueprints: Arc<Blueprints>) -> Self {
        Self::with_config(transport, ChannelConfig::default(), blueprints)
    }

    pub fn with_config(transport: T, config: ChannelConfig, blueprints: Arc<Blueprints>) -> Self {
        Self {
            io: BufReader::new(transport),
            config,
            blueprints,
        }
    }

    pub fn config(&self) -> ChannelConfig {
        self.config
    }

    pub fn blueprints(&self) -> &Arc<Blueprints> {
        &self.blueprints
    }

    pub fn get_ref(&self) -> &T {
        self.io.get_ref()
    }

    /// Returns the transport. Input already buffered by the channel is lost.
    pub fn into_inner(self) -> T {
        self.io.into_inner()
    }

    /// Reads objects until the transport is exhausted, handing each to `f`.
    ///
    /// Stops at the first error from either side. Input that ends inside a
    /// binary frame is an error, not a clean end.
    pub fn collect(&mut self, mut f: impl FnMut(Box<dyn Object>) -> Result<()>) -> Result<()> {
        loop {
            match self.read_object() {
                Ok(obj) => f(obj)?,
                Err(e) if e.is_eof() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// The next non-blank line without its line terminator.
    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.io.read_line(&mut line)? == 0 {
                return Err(Error::eof());
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if !trimmed.trim().is_empty() {
                return Ok(trimmed.to_owned());
            }
        }
    }

    fn read_text(&mut self) -> Result<Box<dyn Object>> {
        let line = self.read_line()?;
        let (type_name, text) = split_typed_line(&line)?;
        let mut obj = self
            .blueprints
            .instantiate(type_name)
            .ok_or_else(|| Error::BlueprintNotFound(type_name.to_owned()))?;
        obj.from_text(text)?;
        Ok(obj)
    }

    fn send(&mut self, line: &[u8]) -> Result<u64> {
        let w = self.io.get_mut();
        w.write_all(line)?;
        w.flush()?;
        Ok(line.len() as u64)
    }
}

/// Splits `#[type] text` into its type name and text.
fn split_typed_line(line: &str) -> Result<(&str, &str)> {
    let missing = || Error::InvalidText(format!("expected `#[type] text`, got {line:?}"));
    let rest = line.strip_prefix("#[").ok_or_else(missing)?;
    let (type_name, text) = rest.split_once(']').ok_or_else(missing)?;
    if type_name.is_empty() {
        return Err(Error::EmptyType);
    }
    Ok((type_name, text.strip_prefix(' ').unwrap_or(text)))
}

impl<T: Read + Write> ObjectReader for Channel<T> {
    fn read_object(&mut self) -> Result<Box<dyn Object>> {
        match self.config.input {
            Format::Binary => read_frame(&mut self.io, BINARY_FRAME_WIDTH, &self.blueprints, false),
            Format::Json => {
                let line = self.read_line()?;
                let value: serde_json::Value = serde_json::from_str(&line)?;
                open_envelope(&value, &self.blueprints)
            }
            Format::Text | Format::TextTyped => self.read_text(),
        }
    }
}

impl<T: Read + Write> ObjectWriter for Channel<T> {
    fn write_object(&mut self, obj: &dyn Object) -> Result<u64> {
        match self.config.output {
            Format::Binary => {
                let w = self.io.get_mut();
                let n = write_frame(w, BINARY_FRAME_WIDTH, &self.blueprints, obj)?;
                w.flush()?;
                Ok(n)
            }
            Format::Json => {
                let mut line = serde_json::to_vec(&JsonEnvelope::seal(obj)?)?;
                line.push(b'\n');
                self.send(&line)
            }
            Format::Text => {
                let line = format!("{}\n", obj.to_text()?);
                self.send(line.as_bytes())
            }
            Format::TextTyped => {
                let type_name = obj.object_type();
                if type_name.is_empty() {
                    return Err(Error::EmptyType);
                }
                let line = format!("#[{type_name}] {}\n", obj.to_text()?);
                self.send(line.as_bytes())
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("transport", self.io.get_ref())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::ints::{Bool, Int32, Uint8};
    use crate::strings::String8;

    /// Reads from a fixed input and records everything written.
    #[derive(Debug, Default)]
    struct Pipe {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Pipe {
        fn with_input(input: impl Into<Vec<u8>>) -> Self {
            Self {
                input: Cursor::new(input.into()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn builtins() -> Arc<Blueprints> {
        Arc::new(Blueprints::with_builtins())
    }

    fn channel(input: &[u8], config: &str) -> Channel<Pipe> {
        Channel::with_config(Pipe::with_input(input), config.parse().unwrap(), builtins())
    }

    #[test]
    fn format_parsing() {
        assert_eq!("".parse::<Format>().unwrap(), Format::Binary);
        assert_eq!("text+".parse::<Format>().unwrap(), Format::TextTyped);
        assert!("yaml".parse::<Format>().is_err());
        let config: ChannelConfig = "json,text+".parse().unwrap();
        assert_eq!(config, ChannelConfig::new(Format::Json, Format::TextTyped));
        assert_eq!(Format::TextTyped.to_string(), "text+");
    }

    #[test]
    fn config_from_serde() {
        let config: ChannelConfig = serde_json::from_str(r#"{"output": "text+"}"#).unwrap();
        assert_eq!(config, ChannelConfig::new(Format::Binary, Format::TextTyped));
        assert_eq!(
            serde_json::to_value(config).unwrap(),
            serde_json::json!({ "input": "binary", "output": "text+" })
        );
    }

    #[test]
    fn binary_uses_16_bit_frames() {
        let mut ch = channel(b"", "binary");
        ch.write_object(&Uint8(9)).unwrap();
        assert_eq!(ch.get_ref().output, b"\x00\x07\x05uint8\x09");

        let output = ch.into_inner().output;
        let mut back = channel(&output, "binary");
        let obj = back.read_object().unwrap();
        assert_eq!(obj.downcast_ref::<Uint8>(), Some(&Uint8(9)));
    }

    #[test]
    fn json_lines() {
        let mut ch = channel(b"", "json");
        ch.write_object(&Int32(-3)).unwrap();
        ch.write_object(&Bool(true)).unwrap();
        let output = ch.into_inner().output;
        assert_eq!(
            String::from_utf8(output.clone()).unwrap(),
            "{\"type\":\"int32\",\"object\":-3}\n{\"type\":\"bool\",\"object\":true}\n"
        );

        let mut back = channel(&output, "json");
        let mut seen = Vec::new();
        back.collect(|obj| {
            seen.push(obj.object_type().to_owned());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, ["int32", "bool"]);
    }

    #[test]
    fn text_output_forms() {
        let mut plain = channel(b"", "binary,text");
        plain.write_object(&String8::from("hi there")).unwrap();
        assert_eq!(plain.get_ref().output, b"hi there\n");

        let mut typed = channel(b"", "binary,text+");
        typed.write_object(&Int32(7)).unwrap();
        assert_eq!(typed.get_ref().output, b"#[int32] 7\n");
    }

    #[test]
    fn typed_text_input() {
        let mut ch = channel(b"#[int32] 12\n\n#[string8] a b\n", "text");
        let first = ch.read_object().unwrap();
        assert_eq!(first.downcast_ref::<Int32>(), Some(&Int32(12)));
        let second = ch.read_object().unwrap();
        assert_eq!(second.downcast_ref::<String8>().unwrap().0, "a b");
        assert!(ch.read_object().unwrap_err().is_eof());
    }

    #[test]
    fn text_input_errors() {
        let mut untyped = channel(b"12\n", "text");
        assert!(matches!(untyped.read_object(), Err(Error::InvalidText(_))));

        let mut unknown = channel(b"#[mystery] 1\n", "text+");
        assert!(matches!(unknown.read_object(), Err(Error::BlueprintNotFound(_))));
    }

    #[test]
    fn collect_reports_truncated_binary_frame() {
        let mut whole = Vec::new();
        write_frame(&mut whole, BINARY_FRAME_WIDTH, &Blueprints::with_builtins(), &Int32(4)).unwrap();
        whole.extend_from_slice(&[0x00, 0x07, 0x05, b'u', b'i']);

        let mut ch = channel(&whole, "binary");
        let mut seen = 0;
        let result = ch.collect(|_| {
            seen += 1;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Truncated(_))));
        assert_eq!(seen, 1);
    }

    #[test]
    fn collect_stops_on_handler_error() {
        let mut ch = channel(b"#[bool] true\n#[bool] false\n", "text");
        let mut count = 0;
        let err = ch
            .collect(|_| {
                count += 1;
                Err(Error::Unsupported("stop".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(count, 1);
    }
}
