//! Throwaway shell scripts standing in for the downloader and the player

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Downloader that appends a line to `counter` per run and writes an `m4a`
/// file wherever `-o` points
pub fn fake_downloader(dir: &Path, counter: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-yt-dlp",
        &format!(
            r#"echo run >> "{counter}"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/m4a/')
printf 'audio' > "$file""#,
            counter = counter.display()
        ),
    )
}

/// Downloader that always fails with a message on stderr
pub fn failing_downloader(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "broken-yt-dlp",
        "echo 'WARNING: retrying' >&2\necho 'ERROR: Video unavailable' >&2\nexit 1",
    )
}

/// Player that creates the socket file named by `--input-ipc-server` and idles
pub fn fake_player(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-mpv",
        r#"for arg in "$@"; do
  case "$arg" in
    --input-ipc-server=*) touch "${arg#--input-ipc-server=}" ;;
  esac
done
exec sleep 30"#,
    )
}

/// Player that never opens its socket; records its pid in `pidfile`
pub fn silent_player(dir: &Path, pidfile: &Path) -> PathBuf {
    write_script(
        dir,
        "silent-mpv",
        &format!("echo $$ > \"{}\"\nexec sleep 30", pidfile.display()),
    )
}

/// Player that exits immediately
pub fn crashing_player(dir: &Path) -> PathBuf {
    write_script(dir, "crash-mpv", "exit 3")
}
