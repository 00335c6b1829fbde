//
// plan.rs: Build plans
//
// A BuildPlan is everything needed to run a vendor toolchain over a
// design: the generated files, by name, and the ordered list of steps
// the build scripts perform. Nothing here runs a tool. Plans are
// either inspected directly or written out to a directory.
//

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;
use log::info;

use crate::errors::{FileError, FileErrorKind};
use crate::templates::tool_env_var;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Sh,
    Bat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Tool { tool: String, args: Vec<String> },
    Copy { from: String, to: String },
}

// Words made only of these need no quoting in either script syntax.
fn is_plain(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=+,@".contains(c))
}

// sh single quotes take everything literally, so only the quote itself
// needs escaping. cmd has no such quoting; double quotes protect
// whitespace and embedded double quotes are doubled.
fn quote(arg: &str, syntax: Syntax) -> String {
    if is_plain(arg) {
        return arg.to_string();
    }
    match syntax {
        Syntax::Sh => format!("'{}'", arg.replace('\'', "'\\''")),
        Syntax::Bat => format!("\"{}\"", arg.replace('"', "\"\"")),
    }
}

impl Step {
    pub fn tool(tool: &str, args: Vec<String>) -> Step {
        Step::Tool {
            tool: tool.to_string(),
            args,
        }
    }

    // One command line, in the given script syntax. Tools are invoked
    // through their environment variable so they can be overridden.
    pub fn render(&self, syntax: Syntax) -> String {
        match (self, syntax) {
            (Step::Tool { tool, args }, _) => {
                let env_var = tool_env_var(tool);
                let invoke = match syntax {
                    Syntax::Sh => format!("\"${}\"", env_var),
                    Syntax::Bat => format!("%{}%", env_var),
                };
                std::iter::once(invoke)
                    .chain(args.iter().map(|arg| quote(arg, syntax)))
                    .join(" ")
            }
            (Step::Copy { from, to }, Syntax::Sh) => {
                format!("cp {} {}", quote(from, syntax), quote(to, syntax))
            }
            (Step::Copy { from, to }, Syntax::Bat) => {
                format!("copy {} {}", quote(from, syntax), quote(to, syntax))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildPlan {
    pub name: String,
    pub files: IndexMap<String, String>,
    pub steps: Vec<Step>,
}

impl BuildPlan {
    pub fn new(name: &str) -> Self {
        BuildPlan {
            name: name.to_string(),
            files: IndexMap::new(),
            steps: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file_name: String, content: String) {
        self.files.insert(file_name, content);
    }

    pub fn file(&self, file_name: &str) -> Option<&str> {
        self.files.get(file_name).map(String::as_str)
    }

    // Name of the script that runs the whole build.
    pub fn script(&self, syntax: Syntax) -> String {
        match syntax {
            Syntax::Sh => format!("build_{}.sh", self.name),
            Syntax::Bat => format!("build_{}.bat", self.name),
        }
    }

    pub fn write_files(&self, dir: &Path) -> Result<(), FileError> {
        let in_file = |file: &Path, err: FileErrorKind| FileError {
            file: file.to_path_buf(),
            err,
        };

        fs::create_dir_all(dir).map_err(|e| in_file(dir, e.into()))?;
        for (file_name, content) in self.files.iter() {
            let path = dir.join(file_name);
            info!("writing {}", path.display());
            let mut file = File::create(&path).map_err(|e| in_file(&path, e.into()))?;
            file.write_all(content.as_bytes())
                .map_err(|e| in_file(&path, e.into()))?;
        }
        Ok(())
    }
}
