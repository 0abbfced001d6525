mod events;
mod propagators;
mod sensitivity;
