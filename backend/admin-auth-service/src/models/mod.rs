pub mod requests;
pub mod user;

pub use requests::{
    ChangePasswordRequest, CreateUserRequest, ListUsersQuery, LoginRequest, LoginResponse,
    Pagination, UpdateUserRequest, UserList,
};
pub use user::{NewUser, Role, UserChanges, UserProfile, UserRecord, SUPER_ADMIN};
