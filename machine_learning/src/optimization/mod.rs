mod gradient_descent;
mod optimizer;
mod rprop;

pub use gradient_descent::GradientDescent;
pub use optimizer::Optimizer;
pub use rprop::Rprop;
