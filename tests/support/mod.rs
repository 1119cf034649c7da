pub mod labelkit_env;
