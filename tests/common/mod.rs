#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use agro_report::config::Config;
use tempfile::{TempDir, tempdir};

pub const HEADER: &str = "Safra,Regiao,Cultura,Subtipo,Produtividade_t_ha,Nivel_Tecnologico";

/// Five records: one missing value, one below and one above the valid range.
pub const SCENARIO_CSV: &str = "\
Safra,Regiao,Cultura,Subtipo,Produtividade_t_ha,Nivel_Tecnologico
2021/22,Sul,Soja,,-3,Alto
2021/22,Sudeste,Milho,,2.0,Medio
2022/23,Sul,Soja,,5.5,Alto
2022/23,Nordeste,Feijão,Carioca,25.0,Baixo
2022/23,Centro-Oeste,Milho,,NA,Medio
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Configuration reading `input` and writing every artifact inside the
    /// workspace.
    pub fn config(&self, input: &Path) -> Config {
        Config {
            data_file: input.to_path_buf(),
            reports_dir: self.reports_dir(),
            export_dir: self.path().join("exportacoes"),
            r_script_file: self.path().join("analise.R"),
            ..Config::default()
        }
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.path().join("relatorios")
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative))
            .unwrap_or_else(|err| panic!("read {relative}: {err}"))
    }
}
