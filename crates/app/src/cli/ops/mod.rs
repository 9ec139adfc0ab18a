pub mod cat;
pub mod init;
pub mod ls;
pub mod meta;
pub mod rm;
pub mod tail;
pub mod version;

pub use cat::Cat;
pub use init::Init;
pub use ls::Ls;
pub use meta::Meta;
pub use rm::Rm;
pub use tail::Tail;
pub use version::Version;
