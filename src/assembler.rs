use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use uuid::Uuid;

use crate::config::AssemblerConfig;
use crate::error::AssemblerError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Turns assembly source into a flat binary image for `Cpu::load_program`.
pub trait Assembler {
    fn assemble(&self, source: &str) -> Result<Vec<u8>, AssemblerError>;

    fn assemble_file(&self, path: &Path) -> Result<Vec<u8>, AssemblerError>;
}

/// Drives the external 64tass cross assembler.
#[derive(Debug, Clone)]
pub struct TassAssembler {
    executable: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl TassAssembler {
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        TassAssembler {
            executable: executable.into(),
            args,
            work_dir: std::env::temp_dir(),
        }
    }

    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(config.executable.clone(), config.args.clone())
    }

    /// Directory for intermediate files. Defaults to the system temp dir.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    fn temp_path(&self, suffix: &str) -> PathBuf {
        self.work_dir
            .join(format!("w65c02_{}{}", Uuid::new_v4().simple(), suffix))
    }

    fn run(&self, input: &Path) -> Result<Vec<u8>, AssemblerError> {
        let output_path = self.temp_path(".bin");
        let result = self.invoke(input, &output_path);
        remove_quietly(&output_path);
        result
    }

    fn invoke(&self, input: &Path, output_path: &Path) -> Result<Vec<u8>, AssemblerError> {
        log::debug!(
            "running {} {:?} -o {} {}",
            self.executable.display(),
            self.args,
            output_path.display(),
            input.display()
        );
        let output = Command::new(&self.executable)
            .args(&self.args)
            .arg("-o")
            .arg(output_path)
            .arg(input)
            .output()
            .map_err(|source| AssemblerError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AssemblerError::Failed {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        match fs::read(output_path) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(AssemblerError::NoOutput(output_path.to_path_buf())),
        }
    }
}

impl Default for TassAssembler {
    fn default() -> Self {
        Self::from_config(&AssemblerConfig::default())
    }
}

impl Assembler for TassAssembler {
    fn assemble(&self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        if source.trim().is_empty() {
            return Err(AssemblerError::EmptySource);
        }
        let input = self.temp_path(".asm");
        let bytes = source.as_bytes();
        fs::write(&input, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes))?;
        let result = self.run(&input);
        remove_quietly(&input);
        result
    }

    fn assemble_file(&self, path: &Path) -> Result<Vec<u8>, AssemblerError> {
        if path.as_os_str().is_empty() {
            return Err(AssemblerError::EmptySource);
        }
        if !path.is_file() {
            return Err(AssemblerError::InputNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        match bytes.strip_prefix(UTF8_BOM) {
            Some(stripped) => {
                // 64tass rejects a leading BOM
                let input = self.temp_path("_nobom.asm");
                fs::write(&input, stripped)?;
                let result = self.run(&input);
                remove_quietly(&input);
                result
            }
            None => self.run(path),
        }
    }
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            log::debug!("could not remove {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("w65c02_asm_test_{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_empty_source_rejected() {
        let assembler = TassAssembler::default();
        assert!(matches!(assembler.assemble("  \n"), Err(AssemblerError::EmptySource)));
    }

    #[test]
    fn test_missing_input_file() {
        let assembler = TassAssembler::default();
        let err = assembler
            .assemble_file(Path::new("/definitely/not/here.asm"))
            .unwrap_err();
        assert!(matches!(err, AssemblerError::InputNotFound(_)));
    }

    #[test]
    fn test_spawn_failure() {
        let assembler = TassAssembler::new("/no/such/64tass", vec![]).with_work_dir(scratch_dir());
        let err = assembler.assemble("lda #$42").unwrap_err();
        assert!(matches!(err, AssemblerError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let assembler = TassAssembler::new("false", vec![]).with_work_dir(scratch_dir());
        let err = assembler.assemble("lda #$42").unwrap_err();
        assert!(matches!(err, AssemblerError::Failed { code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output() {
        let assembler = TassAssembler::new("true", vec![]).with_work_dir(scratch_dir());
        let err = assembler.assemble("lda #$42").unwrap_err();
        assert!(matches!(err, AssemblerError::NoOutput(_)));
    }

    // Stand-in tool: `sh -c 'cp "$3" "$2"' sh -o OUT IN` copies the source to the output.
    #[cfg(unix)]
    fn copying_assembler(dir: &Path) -> TassAssembler {
        TassAssembler::new(
            "sh",
            vec!["-c".to_string(), "cp \"$3\" \"$2\"".to_string(), "sh".to_string()],
        )
        .with_work_dir(dir)
    }

    #[cfg(unix)]
    #[test]
    fn test_output_bytes_returned_and_temp_files_removed() {
        let dir = scratch_dir();
        let assembler = copying_assembler(&dir);
        let bytes = assembler.assemble("\u{FEFF}NOP").unwrap();
        assert_eq!(bytes, b"NOP".to_vec());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_assemble_file_strips_bom() {
        let dir = scratch_dir();
        let source = dir.join("prog.asm");
        fs::write(&source, [UTF8_BOM, b"BRK".as_slice()].concat()).unwrap();
        let bytes = copying_assembler(&dir).assemble_file(&source).unwrap();
        assert_eq!(bytes, b"BRK".to_vec());
        assert!(source.exists());
    }
}
