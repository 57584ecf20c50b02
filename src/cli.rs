//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use clap::crate_authors;
use clap::crate_version;
use clap::Arg;
use clap::Command;

pub fn cli() -> Command<'static> {
    Command::new("veridock")
        .author(crate_authors!())
        .version(crate_version!())
        .about("Submission validation worker: runs participant docker images and probes them over HTTP")

        .arg(Arg::new("config")
            .required(false)
            .multiple_values(false)
            .long("config")
            .takes_value(true)
            .help("Path to the configuration file, without extension (default: 'config')")
        )

        .arg(Arg::new("database_host")
            .required(false)
            .multiple_values(false)
            .long("db-url")
            .takes_value(true)
            .help("Overwrite the database host from the configuration file")
        )
        .arg(Arg::new("database_port")
            .required(false)
            .multiple_values(false)
            .long("db-port")
            .takes_value(true)
            .help("Overwrite the database port from the configuration file")
        )
        .arg(Arg::new("database_user")
            .required(false)
            .multiple_values(false)
            .long("db-user")
            .takes_value(true)
            .help("Overwrite the database user from the configuration file")
        )
        .arg(Arg::new("database_password")
            .required(false)
            .multiple_values(false)
            .long("db-password")
            .alias("db-pw")
            .takes_value(true)
            .help("Overwrite the database password from the configuration file")
        )
        .arg(Arg::new("database_name")
            .required(false)
            .multiple_values(false)
            .long("db-name")
            .takes_value(true)
            .help("Overwrite the database name from the configuration file")
        )
        .arg(Arg::new("database_connection_timeout")
            .required(false)
            .multiple_values(false)
            .long("db-timeout")
            .takes_value(true)
            .help("Overwrite the database connection timeout from the configuration file")
        )

        .arg(Arg::new("max_concurrency")
            .required(false)
            .multiple_values(false)
            .long("submissions")
            .takes_value(true)
            .help("Overwrite the number of submissions processed concurrently")
        )
        .arg(Arg::new("interval")
            .required(false)
            .multiple_values(false)
            .long("interval")
            .takes_value(true)
            .help("Overwrite the base interval (in seconds) between dispatch cycles")
        )
}
