mod rds;

pub use rds::RdsBackupEngine;
