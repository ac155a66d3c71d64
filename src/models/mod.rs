pub mod anime;
pub mod friend;
pub mod notification;
pub mod stats;
pub mod user;
pub mod watchlist;

pub use anime::{Anime, RemoteEntry, RemotePush, RemoteViewer};
pub use friend::{Friend, FriendRequest, FriendRequestStatus};
pub use notification::{Notification, NotificationKind};
pub use stats::{GenreCount, WatchStats};
pub use user::{Profile, User};
pub use watchlist::{WatchStatus, WatchlistEntry};
