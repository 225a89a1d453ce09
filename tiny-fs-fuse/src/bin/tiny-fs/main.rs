mod cli;

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use tiny_fs::{BLOCK_SIZE, BlockState, TinyFileSystem};
use tiny_fs_fuse::FileStore;
use typed_bytesize::ByteSizeIec;

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    fs::create_dir_all(&cli.image_dir)?;
    let mut tfs = TinyFileSystem::new(Arc::new(FileStore::new(&cli.image_dir)));
    let disk = cli.disk.as_str();

    match cli.command {
        Command::Mkfs { size } => {
            let size = size.unwrap_or(ByteSizeIec::kib(10).0 as usize);
            tfs.mkfs(disk, size).map_err(fs_error)?;
            println!("{disk}: {} blocks", size / BLOCK_SIZE);
        }
        Command::Ls => {
            for name in with_volume(&mut tfs, disk, |tfs| tfs.list_names())? {
                println!("{name}");
            }
        }
        Command::Put { source, name } => {
            let data = fs::read(&source)?;
            let name = match name {
                Some(name) => name,
                None => source
                    .file_name()
                    .and_then(|fname| fname.to_str())
                    .ok_or_else(|| io::Error::other("source has no usable file name"))?
                    .to_owned(),
            };
            log::info!("put {source:?} as {name:?}, {} bytes", data.len());

            with_volume(&mut tfs, disk, |tfs| {
                let file = tfs.open(&name)?;
                tfs.write(file, &data)?;
                tfs.close(file)
            })?;
        }
        Command::Cat { name } => {
            let data = with_volume(&mut tfs, disk, |tfs| {
                let file = open_existing(tfs, &name)?;
                tfs.read_to_end(file)
            })?;
            let len = data.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
            io::stdout().write_all(&data[..len])?;
        }
        Command::Rm { name } => {
            with_volume(&mut tfs, disk, |tfs| {
                let file = open_existing(tfs, &name)?;
                tfs.delete(file)
            })?;
        }
        Command::Mv { from, to } => {
            with_volume(&mut tfs, disk, |tfs| {
                let file = open_existing(tfs, &from)?;
                tfs.rename(file, &to)
            })?;
        }
        Command::Frag => {
            let map = with_volume(&mut tfs, disk, |tfs| tfs.fragments())?;
            print_fragments(&map);
        }
        Command::Defrag => {
            let (moved, map) = with_volume(&mut tfs, disk, |tfs| {
                let moved = tfs.defrag()?;
                Ok((moved, tfs.fragments()?))
            })?;
            println!("{moved} blocks moved");
            print_fragments(&map);
        }
        Command::Demo => demo(&mut tfs, disk).map_err(fs_error)?,
    }

    Ok(())
}

/// 挂载、执行、卸载；无论 `f` 成败都会尝试卸载
fn with_volume<T>(
    tfs: &mut TinyFileSystem,
    disk: &str,
    f: impl FnOnce(&mut TinyFileSystem) -> tiny_fs::Result<T>,
) -> io::Result<T> {
    tfs.mount(disk).map_err(fs_error)?;
    let result = f(tfs);
    let unmounted = tfs.unmount();

    let value = result.map_err(fs_error)?;
    unmounted.map_err(fs_error)?;
    Ok(value)
}

/// 只打开已存在的文件，而不是顺手创建
fn open_existing(tfs: &mut TinyFileSystem, name: &str) -> tiny_fs::Result<tiny_fs::FileHandle> {
    if !tfs.exists(name)? {
        return Err(tiny_fs::Error::NotFound);
    }
    tfs.open(name)
}

fn print_fragments(map: &[BlockState]) {
    let row: String = map
        .iter()
        .map(|state| match state {
            BlockState::Used => '#',
            BlockState::Free => '.',
        })
        .collect();
    let used = map.iter().filter(|&&state| state == BlockState::Used).count();
    println!("[{row}] {used}/{} used", map.len());
}

fn demo(tfs: &mut TinyFileSystem, disk: &str) -> tiny_fs::Result<()> {
    tfs.mkfs(disk, ByteSizeIec::kib(10).0 as usize)?;

    if let Err(err) = tfs.mount("not_formatted_file_system") {
        println!("mount not_formatted_file_system: {err}");
    }
    tfs.mount(disk)?;

    let file0 = tfs.open("file0")?;
    let file1 = tfs.open("file1")?;
    let file2 = tfs.open("file2")?;
    println!("opened file0={file0} file1={file1} file2={file2}");

    tfs.close(file2)?;
    if let Err(err) = tfs.close(file2) {
        println!("close file2 again: {err}");
    }

    tfs.write(file0, b"0123456789")?;
    if let Err(err) = tfs.write(file2, b"file already closed") {
        println!("write file2: {err}");
    }

    tfs.delete(file1)?;

    let bytes = [tfs.read_byte(file0)?, tfs.read_byte(file0)?, tfs.read_byte(file0)?];
    println!("read file0: {:?}", bytes.map(char::from));

    tfs.seek(file0, 9)?;
    println!("seek file0 to 9: {:?}", char::from(tfs.read_byte(file0)?));

    tfs.rename(file0, "rename0")?;
    if let Err(err) = tfs.rename(file1, "rename1") {
        println!("rename deleted file1: {err}");
    }
    if let Err(err) = tfs.rename(file2, "rename2") {
        println!("rename closed file2: {err}");
    }
    println!("files: {:?}", tfs.list_names()?);

    print_fragments(&tfs.fragments()?);
    println!("{} blocks moved", tfs.defrag()?);
    print_fragments(&tfs.fragments()?);

    tfs.unmount()
}

fn fs_error(err: tiny_fs::Error) -> io::Error {
    io::Error::other(err)
}
