pub use crate::id::Id;
pub use crate::principal::{PrincipalId, ResolvedPrincipal, Role};
pub use crate::time::now;
pub use crate::trace::CorrelationId;
