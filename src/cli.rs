// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::db::Database;
use crate::error::Fallible;
use crate::server::start_server;

#[derive(Parser, Debug, PartialEq)]
#[command(version, about, long_about = None)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// The port to listen on.
        #[arg(long)]
        port: Option<u16>,
        /// Path to the SQLite database.
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Create the database schema and exit.
    Migrate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to the SQLite database.
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Serve {
            config,
            port,
            database,
        } => {
            let config = Config::load(config.as_deref())?.with_overrides(port, database);
            start_server(config).await
        }
        Command::Migrate { config, database } => {
            let config = Config::load(config.as_deref())?.with_overrides(None, database);
            Database::open(&config.database)?;
            println!("Database ready at {}.", config.database.display());
            Ok(())
        }
    }
}
