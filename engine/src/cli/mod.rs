pub mod commands;

#[derive(clap::Subcommand, Debug)]
pub enum RdsCommands {
    /// Back up every RDS instance carrying the marker tag
    CreateBackups {
        /// Marker tag key (defaults to `{tag_prefix}:create_backup`)
        #[clap(long)]
        marker_tag: Option<String>,

        /// Backup mode override (CREATE_SNAPSHOT or COPY_AUTOMATED_SNAPSHOT)
        #[clap(long)]
        mode: Option<String>,
    },

    /// List backups managed under a tag prefix
    ListBackups {
        /// Tag prefix (defaults to the configured prefix)
        #[clap(long)]
        tag_prefix: Option<String>,
    },

    /// Show one backup reconstructed from its tags
    DescribeBackup {
        /// Snapshot identifier
        backup_id: String,

        /// Region the snapshot lives in
        #[clap(long)]
        region: Option<String>,
    },

    /// Report whether a backup is available
    BackupStatus {
        /// Snapshot identifier
        backup_id: String,

        /// Region the snapshot lives in
        #[clap(long)]
        region: Option<String>,

        /// Block until the snapshot is available
        #[clap(long)]
        wait: bool,
    },

    /// Grant restore permission on a backup to other accounts
    ShareBackup {
        /// Snapshot identifier
        backup_id: String,

        /// Account id to share with (repeatable)
        #[clap(long = "account", required = true)]
        accounts: Vec<String>,

        /// Region the snapshot lives in
        #[clap(long)]
        region: Option<String>,
    },

    /// Copy a backup into other regions and re-apply its tags there
    CopyBackup {
        /// Snapshot identifier
        backup_id: String,

        /// Destination region (repeatable)
        #[clap(long = "to", required = true)]
        regions: Vec<String>,
    },

    /// Delete a backup
    DeleteBackup {
        /// Snapshot identifier
        backup_id: String,

        /// Region the snapshot lives in
        #[clap(long)]
        region: Option<String>,
    },

    /// Share and copy every existing backup as configured
    ProcessBackups,
}
