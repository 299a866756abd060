#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use esh_core::{FsImage, Navigator};
use esh_error::EshError;
use esh_ondisk::FileType;
use esh_types::InodeNumber;
use serde::Serialize;
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "shell" => {
            let Some(path) = args.next() else {
                bail!("shell requires an image path");
            };
            shell(Path::new(&path))
        }
        "extract" => {
            let rest: Vec<String> = args.collect();
            let (image, ino, output) = match rest.as_slice() {
                [image, output] => (image, InodeNumber::ROOT, output),
                [image, ino, output] => {
                    let ino: u32 = ino
                        .parse()
                        .with_context(|| format!("invalid inode number: {ino}"))?;
                    (image, InodeNumber(ino), output)
                }
                _ => bail!("extract requires <image> [inode-num] <output>"),
            };
            extract(Path::new(image), ino, Path::new(output))
        }
        "inspect" => {
            let Some(path) = args.next() else {
                bail!("inspect requires a path argument");
            };
            let json = args.any(|arg| arg == "--json");
            inspect(Path::new(&path), json)
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("extshell\n");
    println!("USAGE:");
    println!("  extshell shell <image-path>");
    println!("  extshell extract <image-path> [inode-num] <output-path>");
    println!("  extshell inspect <image-path> [--json]");
}

// ── shell ───────────────────────────────────────────────────────────────────

/// scanf-style token stream over stdin: a command and its argument may
/// arrive on one line or on successive lines.
struct Tokens<R> {
    reader: R,
    queue: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            queue: VecDeque::new(),
        }
    }

    /// Next whitespace-delimited token, or `None` at end of input.
    fn next_token(&mut self) -> io::Result<Option<String>> {
        while self.queue.is_empty() {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.queue
                .extend(line.split_whitespace().map(str::to_owned));
        }
        Ok(self.queue.pop_front())
    }
}

fn shell(path: &Path) -> Result<()> {
    let image = FsImage::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?;

    let sb = image.superblock();
    println!("block size\t\t= {} bytes", image.block_size());
    println!("inode count\t\t= {:#x}", sb.inodes_count);
    println!("inode size\t\t= {:#x}", sb.inode_size);
    println!("inode table address\t= {:#x}", image.blockgroup().inode_table);
    println!(
        "inode table size\t= {}KB",
        (u64::from(sb.inodes_count) * u64::from(sb.inode_size)) >> 10
    );

    let mut nav = Navigator::new();
    let stdin = io::stdin();
    let mut tokens = Tokens::new(stdin.lock());

    loop {
        print!("ext-shell$ ");
        io::stdout().flush()?;

        let Some(command) = tokens.next_token()? else {
            break;
        };

        match command.as_str() {
            "q" => break,
            "ls" => report(ls(&image, &nav)),
            "cd" => {
                let Some(name) = tokens.next_token()? else {
                    break;
                };
                report(cd(&image, &mut nav, &name));
            }
            "cp" => {
                let Some(name) = tokens.next_token()? else {
                    break;
                };
                report(cp(&image, &nav, &name));
            }
            other => println!("Unknown command: {other}"),
        }
    }

    println!("\nQuitting ext-shell.");
    Ok(())
}

/// Decode and I/O failures abort the command, not the shell.
fn report(result: std::result::Result<(), EshError>) {
    if let Err(error) = result {
        eprintln!("error: {error}");
    }
}

fn ls(image: &FsImage, nav: &Navigator) -> std::result::Result<(), EshError> {
    for entry in image.list_dir(nav.cwd())? {
        let inode = image.inode(InodeNumber(entry.inode))?;
        println!(
            "{}{}\t{}\t{}",
            entry.file_type.glyph(),
            inode.mode.symbolic(),
            entry.inode,
            entry.name_str()
        );
    }
    Ok(())
}

fn cd(
    image: &FsImage,
    nav: &mut Navigator,
    name: &str,
) -> std::result::Result<(), EshError> {
    if nav.change_dir(image, name.as_bytes())? {
        println!("Now in directory {name}");
    } else {
        println!("Directory {name} does not exist");
    }
    Ok(())
}

fn cp(image: &FsImage, nav: &Navigator, name: &str) -> std::result::Result<(), EshError> {
    match image.find_by_name(nav.cwd(), name.as_bytes(), FileType::RegFile)? {
        Some(entry) => {
            println!("Saving file {name}");
            let content = image.read_file(InodeNumber(entry.inode))?;
            fs::write(name, &content).map_err(|source| EshError::Output {
                path: name.to_owned(),
                source,
            })?;
        }
        None => println!("File {name} does not exist"),
    }
    Ok(())
}

// ── extract ─────────────────────────────────────────────────────────────────

fn extract(image_path: &Path, ino: InodeNumber, output: &Path) -> Result<()> {
    let image = FsImage::open(image_path)
        .with_context(|| format!("failed to open image {}", image_path.display()))?;
    let content = image
        .read_file(ino)
        .with_context(|| format!("failed to read inode {ino}"))?;
    fs::write(output, &content)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

// ── inspect ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InspectOutput {
    filesystem: &'static str,
    block_size: u32,
    blocks_count: u32,
    inodes_count: u32,
    inode_size: u16,
    free_blocks_count: u32,
    free_inodes_count: u32,
    state: u16,
    inode_table_block: u32,
    volume_name: String,
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let image = FsImage::open(path)
        .with_context(|| format!("failed to decode ext2 metadata in {}", path.display()))?;

    let sb = image.superblock();
    let output = InspectOutput {
        filesystem: "ext2",
        block_size: sb.block_size,
        blocks_count: sb.blocks_count,
        inodes_count: sb.inodes_count,
        inode_size: sb.inode_size,
        free_blocks_count: sb.free_blocks_count,
        free_inodes_count: sb.free_inodes_count,
        state: sb.state,
        inode_table_block: image.blockgroup().inode_table,
        volume_name: sb.volume_name.clone(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
    } else {
        println!("filesystem: {}", output.filesystem);
        println!("block_size: {}", output.block_size);
        println!("blocks_count: {}", output.blocks_count);
        println!("inodes_count: {}", output.inodes_count);
        println!("inode_size: {}", output.inode_size);
        println!("free_blocks_count: {}", output.free_blocks_count);
        println!("free_inodes_count: {}", output.free_inodes_count);
        println!("state: {}", output.state);
        println!("inode_table_block: {}", output.inode_table_block);
        println!("volume_name: {}", output.volume_name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Tokens;
    use std::io::Cursor;

    #[test]
    fn tokens_split_within_and_across_lines() {
        let input = Cursor::new("cd docs\nls\ncp\nnotes.txt\nq\n");
        let mut tokens = Tokens::new(input);
        let mut out = Vec::new();
        while let Some(token) = tokens.next_token().expect("read token") {
            out.push(token);
        }
        assert_eq!(out, vec!["cd", "docs", "ls", "cp", "notes.txt", "q"]);
    }

    #[test]
    fn tokens_end_at_eof() {
        let mut tokens = Tokens::new(Cursor::new("\n  \n"));
        assert_eq!(tokens.next_token().expect("read token"), None);
    }
}
