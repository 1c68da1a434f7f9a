//! Build pipeline over an injected compiler service
//!
//! Compilation is delegated to whatever [`Compiler`] the caller hands in;
//! the pipeline only interprets its exit status. Packaging settings come
//! from the [`Config`] the pipeline was created with.

use crate::archive::merge::{ConflictNotice, MergePolicy, Stager};
use crate::archive::uber::explode_directory;
use crate::archive::{assemble_jar, assemble_uber, JarSummary, UberReport};
use crate::config::Config;
use crate::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

/// Inputs for one compiler invocation
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Compilation units (namespaces, modules or source files)
    pub units: &'a [String],
    pub output_dir: &'a Path,
    /// Ordered library paths, as supplied by the dependency resolver
    pub classpath: &'a [PathBuf],
}

/// External compiler service
pub trait Compiler {
    /// Run the compiler and return its process exit status
    fn compile(&self, request: &CompileRequest<'_>) -> Result<i32>;
}

impl<C: Compiler + ?Sized> Compiler for &C {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<i32> {
        (**self).compile(request)
    }
}

impl<C: Compiler + ?Sized> Compiler for Box<C> {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<i32> {
        (**self).compile(request)
    }
}

/// Compiler that runs an external program.
///
/// The command line is `program <args...> -d <output_dir> [-cp <classpath>]
/// <units...>`, with the classpath joined by the platform separator.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build the process invocation for `request` without running it
    pub fn command(&self, request: &CompileRequest<'_>) -> Result<Command> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.arg("-d").arg(request.output_dir);

        if !request.classpath.is_empty() {
            let classpath = std::env::join_paths(request.classpath)
                .map_err(|e| Error::InvalidPath(format!("classpath: {}", e)))?;
            command.arg("-cp").arg(classpath);
        }

        command.args(request.units);
        Ok(command)
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<i32> {
        let mut command = self.command(request)?;
        info!("Running compiler {:?}", self.program);
        let status = command.status()?;
        // Killed by a signal: no exit code
        Ok(status.code().unwrap_or(-1))
    }
}

/// Compile and package steps sharing one configuration
pub struct Pipeline<C> {
    compiler: C,
    config: Config,
}

impl<C: Compiler> Pipeline<C> {
    pub fn new(compiler: C, config: Config) -> Self {
        Self { compiler, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile `units` into `class_dir`; a non-zero exit is fatal
    pub fn compile(&self, units: &[String], classpath: &[PathBuf], class_dir: &Path) -> Result<()> {
        fs::create_dir_all(class_dir)?;

        let request = CompileRequest {
            units,
            output_dir: class_dir,
            classpath,
        };
        info!("Compiling {} units into {:?}", units.len(), class_dir);

        let status = self.compiler.compile(&request)?;
        if status != 0 {
            error!("Compiler exited with status {}", status);
            return Err(Error::Compile { status });
        }
        Ok(())
    }

    /// Copy resource directories into `class_dir`, later ones overwriting
    pub fn copy_resources<P: AsRef<Path>>(
        &self,
        resource_dirs: &[P],
        class_dir: &Path,
    ) -> Result<Vec<ConflictNotice>> {
        fs::create_dir_all(class_dir)?;

        let mut policy = MergePolicy::LastWins;
        let mut stager = Stager::new(class_dir, &mut policy, &[])?;
        for dir in resource_dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                return Err(Error::NotFound(format!("resource directory {:?}", dir)));
            }
            explode_directory(&mut stager, dir, self.config.archive.follow_symlinks)?;
        }
        Ok(stager.into_conflicts())
    }

    /// Package `class_dir` into a jar
    pub fn jar(&self, class_dir: &Path, output: &Path) -> Result<JarSummary> {
        let manifest = self.config.manifest()?;
        assemble_jar(class_dir, output, &manifest, &self.config.jar_options())
    }

    /// Package `libraries` followed by `class_dir` into an uberjar
    pub fn uber<L: AsRef<Path>>(
        &self,
        libraries: &[L],
        class_dir: &Path,
        output: &Path,
    ) -> Result<UberReport> {
        let manifest = self.config.manifest()?;
        assemble_uber(
            libraries,
            class_dir,
            output,
            &manifest,
            self.config.uber_options(),
        )
    }
}
