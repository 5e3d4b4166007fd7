//! Ceph operations and the notifications that conclude them.

use std::fmt;
use std::time::Duration;

use pcc_converge::Expectations;

const INSTALL_TIMEOUT: Duration = Duration::from_secs(1000);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_TIMEOUT: Duration = Duration::from_secs(300);
const FS_TIMEOUT: Duration = Duration::from_secs(300);

const POOL_DEPLOY_COMPLETED: &str = "completed";
const POOL_DEPLOY_FAILED: &str = "failed";
const FS_DEPLOY_COMPLETED: &str = "completed";
const FS_DEPLOY_FAILED: &str = "failed";

/// A Ceph mutation whose outcome is reported through notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CephOperation {
    InstallCluster,
    UninstallCluster,
    CreatePool(String),
    DeletePool(String),
    CreateFs(String),
    DeleteFs(String),
}

impl CephOperation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InstallCluster => "cephClusterInstall",
            Self::UninstallCluster => "cephClusterUninstall",
            Self::CreatePool(_) => "cephPoolCreate",
            Self::DeletePool(_) => "cephPoolDelete",
            Self::CreateFs(_) => "cephFSCreate",
            Self::DeleteFs(_) => "cephFSDelete",
        }
    }

    /// How long to wait for a terminal notification.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::InstallCluster => INSTALL_TIMEOUT,
            Self::UninstallCluster => UNINSTALL_TIMEOUT,
            Self::CreatePool(_) | Self::DeletePool(_) => POOL_TIMEOUT,
            Self::CreateFs(_) | Self::DeleteFs(_) => FS_TIMEOUT,
        }
    }

    /// Notification phrases for this operation on `cluster`.
    pub fn expectations(&self, cluster: &str) -> Expectations {
        match self {
            Self::InstallCluster => Expectations::new()
                .success("Ceph cluster has been deployed")
                .failure(format!("Ceph cluster [{cluster}] installation failed"))
                .failure("Unable to create ceph cluster ")
                .failure("Unable to store ceph cluster ")
                .failure(format!(
                    "Unable to deploy ceph  cluster [{cluster}] as there are no OSD nodes available"
                ))
                .intermediate("Ceph cluster installation begins")
                .intermediate("Successfully created network for ceph cluster")
                .intermediate("Create network failed for ceph cluster")
                .intermediate("Reachability check failed for ceph cluster")
                .intermediate(format!("]. Cluster:[{cluster}]"))
                .intermediate("Provisioning unused drives")
                .intermediate("Creating network for ceph cluster")
                .intermediate("Drive provisionig is finished"),

            Self::UninstallCluster => Expectations::new()
                .success("Successfully deleted network for ceph cluster")
                .failure(format!("Ceph cluster [{cluster}] uninstallation failed"))
                .failure(format!("Unable to remove ceph cluster [{cluster}]"))
                .intermediate("Ceph un-installation started")
                .intermediate("Deleting network for ceph cluster")
                .intermediate("ceph cluster has been removed from DB")
                .intermediate("Ceph cluster has been uninstalled but unable to remove it from database"),

            Self::CreatePool(pool) => Expectations::new()
                .success(format!(
                    "Pool : [{pool}] has been [{POOL_DEPLOY_COMPLETED}] for cluster [{cluster}]"
                ))
                .failure(format!(
                    "Pool : [{pool}] has been [{POOL_DEPLOY_FAILED}] for cluster [{cluster}]"
                ))
                .intermediate(format!("Creating Pool : [{pool}] for cluster [{cluster}]")),

            Self::DeletePool(pool) => Expectations::new()
                .success(format!("Pool [{pool}] has been removed from DB"))
                .failure(format!("Unable to remove pool [{pool}]"))
                .intermediate(format!("Removing Pool : [{pool}] from cluster [{cluster}]")),

            Self::CreateFs(fs) => Expectations::new()
                .success(format!(
                    "FS : [{fs}] has been [{FS_DEPLOY_COMPLETED}] for cluster [{cluster}]"
                ))
                .failure(format!(
                    "FS : [{fs}] has been [{FS_DEPLOY_FAILED}] for cluster [{cluster}]"
                ))
                .failure(format!("Unable to Create FS : [{fs}] for cluster [{cluster}]"))
                .intermediate(format!("Creating FS : [{fs}] for cluster [{cluster}]")),

            Self::DeleteFs(fs) => Expectations::new()
                .success(format!("Ceph FS [{fs}] has been removed from DB"))
                .failure(format!("Unable to remove ceph FS [{fs}]"))
                .failure(format!("Unable to uninstall FS : [{fs}]"))
                .intermediate(format!("Removing FS : [{fs}]")),
        }
    }
}

impl fmt::Display for CephOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallCluster | Self::UninstallCluster => f.write_str(self.label()),
            Self::CreatePool(name)
            | Self::DeletePool(name)
            | Self::CreateFs(name)
            | Self::DeleteFs(name) => write!(f, "{} {}", self.label(), name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcc_converge::Outcome;
    use rstest::rstest;

    #[rstest]
    #[case("Ceph cluster installation begins", Some(Outcome::Intermediate))]
    #[case("Ceph cluster has been deployed", Some(Outcome::Success))]
    #[case("Ceph cluster [cephtest_ci] installation failed", Some(Outcome::Failure))]
    #[case("Ceph cluster [other] installation failed", None)]
    #[case(
        "Unable to deploy ceph  cluster [cephtest_ci] as there are no OSD nodes available",
        Some(Outcome::Failure)
    )]
    #[case("Reachability check failed for ceph cluster [cephtest_ci]", Some(Outcome::Intermediate))]
    fn test_install_classification(#[case] message: &str, #[case] expected: Option<Outcome>) {
        let table = CephOperation::InstallCluster.expectations("cephtest_ci");
        assert_eq!(table.classify(message), expected);
    }

    #[rstest]
    #[case("Pool : [rbdPool1] has been [completed] for cluster [c1]", Some(Outcome::Success))]
    #[case("Pool : [rbdPool1] has been [failed] for cluster [c1]", Some(Outcome::Failure))]
    #[case("Creating Pool : [rbdPool1] for cluster [c1]", Some(Outcome::Intermediate))]
    #[case("Pool : [rbdPool2] has been [completed] for cluster [c1]", None)]
    fn test_pool_create_is_scoped_to_pool(
        #[case] message: &str,
        #[case] expected: Option<Outcome>,
    ) {
        let table = CephOperation::CreatePool("rbdPool1".to_string()).expectations("c1");
        assert_eq!(table.classify(message), expected);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(
            CephOperation::InstallCluster.timeout(),
            Duration::from_secs(1000)
        );
        assert_eq!(
            CephOperation::DeleteFs("cephtest_fs".to_string()).timeout(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CephOperation::CreateFs("cephtest_fs".to_string()).to_string(),
            "cephFSCreate cephtest_fs"
        );
        assert_eq!(CephOperation::UninstallCluster.to_string(), "cephClusterUninstall");
    }
}
